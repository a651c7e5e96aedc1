//! Interop fixtures produced by an independent encoder. The header is built
//! bottom-up in the usual FlatBuffers order: key vectors, key table, FMK
//! vector, record, recipients vector, root table.

use cdoc2_crypto::{CryptoError, EcKeyPair, EllipticCurve, Envelope, ParseOptions, Recipient};

const PLAINTEXT: &[u8] = b"written the way the reference tool writes it\n";

struct Reference {
    curve: EllipticCurve,
    container: &'static [u8],
    key_pem: &'static str,
    header_len: usize,
}

const REFERENCES: [Reference; 2] = [
    Reference {
        curve: EllipticCurve::Secp384r1,
        container: include_bytes!("fixtures/reference-secp384r1.cdoc"),
        key_pem: include_str!("fixtures/reference-secp384r1.pem"),
        header_len: 336,
    },
    Reference {
        curve: EllipticCurve::Secp256r1,
        container: include_bytes!("fixtures/reference-secp256r1.cdoc"),
        key_pem: include_str!("fixtures/reference-secp256r1.pem"),
        header_len: 272,
    },
];

#[test]
fn reference_header_layout() {
    for r in &REFERENCES {
        let declared = u32::from_be_bytes(r.container[5..9].try_into().unwrap()) as usize;
        assert_eq!(declared, r.header_len, "{}", r.curve);
        // root offset of the FlatBuffers header, no file identifier
        assert_eq!(&r.container[9..13], &[12, 0, 0, 0]);
    }
}

#[test]
fn parse_reference_header() {
    for r in &REFERENCES {
        let key = EcKeyPair::from_pem(r.key_pem).unwrap();
        assert_eq!(key.curve(), r.curve);

        let mut input = r.container;
        let parsed = Envelope::parse_header(&mut input, &ParseOptions::default()).unwrap();
        assert_eq!(parsed.header.len(), r.header_len);
        assert_eq!(parsed.recipients.len(), 1);

        let Recipient::Ecc(record) = &parsed.recipients[0] else {
            panic!("{}: expected an ECC record", r.curve);
        };
        assert_eq!(record.curve, r.curve);
        assert_eq!(&record.recipient_public_key, key.public_key());
        assert_ne!(&record.sender_public_key, key.public_key());
        assert_eq!(record.encrypted_fmk.len(), 32);
    }
}

#[test]
fn decrypt_reference_container() {
    for r in &REFERENCES {
        let key = EcKeyPair::from_pem(r.key_pem).unwrap();
        let plaintext = Envelope::decrypt(r.container, &key).unwrap();
        assert_eq!(plaintext, PLAINTEXT, "{}", r.curve);
    }
}

#[test]
fn reference_container_tamper_detected() {
    for r in &REFERENCES {
        let key = EcKeyPair::from_pem(r.key_pem).unwrap();
        let mut input = r.container;
        let parsed = Envelope::parse_header(&mut input, &ParseOptions::default()).unwrap();
        let Recipient::Ecc(record) = &parsed.recipients[0] else {
            panic!("{}: expected an ECC record", r.curve);
        };

        let start = r
            .container
            .windows(32)
            .position(|w| w == record.encrypted_fmk.as_slice())
            .unwrap();
        let mut tampered = r.container.to_vec();
        tampered[start] ^= 0x01;

        let result = Envelope::decrypt(tampered.as_slice(), &key);
        assert!(
            matches!(result, Err(CryptoError::AuthenticationFailure(_))),
            "{}: {result:?}",
            r.curve
        );
    }
}

#[test]
fn reference_container_wrong_key() {
    let key = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
    let result = Envelope::decrypt(REFERENCES[0].container, &key);
    assert!(matches!(result, Err(CryptoError::NoMatchingRecipient)));
}
