//! CDOC2 container framing
//!
//! ```text
//! "CDOC" (4) | version (1, = 2) | header length (u32 BE) | header (FlatBuffers Header)
//! | HMAC-SHA256(header) (32) | payload (nonce || ChaCha20-Poly1305 ciphertext || tag)
//! ```
//!
//! Every recipient record carries the recipient's and the sender's ephemeral
//! public key (TLS encoded) plus the FMK XOR-wrapped with their shared KEK.
//!
//! Decryption reads the header leniently: it only locates the caller's record
//! and unwraps the FMK, then checks the header HMAC. Full header validation
//! runs once the header is known to be authentic, so tampering with an
//! authenticated field reads as `AuthenticationFailure` rather than `Parse`.

use std::io::{self, Read, Write};

use cdoc2_core::fbs::header::{
    finish_header_buffer, root_as_header, Details, FMKEncryptionMethod, Header,
    HeaderBuilder, PayloadEncryptionMethod, RecipientRecord, RecipientRecordBuilder,
};
use cdoc2_core::fbs::recipients::ECCPublicKeyBuilder;
use flatbuffers::FlatBufferBuilder;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::curve::EllipticCurve;
use crate::ec_keys::{decode_tls, encode_tls, EcKeyPair, EcPublicKey};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{
    decrypt_fmk, derive_content_encryption_key, derive_header_hmac_key,
    derive_key_decryption_key, derive_key_encryption_key, encrypt_fmk, header_hmac,
    verify_header_hmac,
};
use crate::key_material::EncryptionKeyMaterial;
use crate::keys::{ContentEncryptionKey, FileMasterKey, HeaderHmacKey};
use crate::payload::{decrypt_payload, encrypt_payload};
use crate::public_key::PublicKey;
use crate::{HMAC_SIZE, KEY_SIZE};

pub const PRELUDE: &[u8; 4] = b"CDOC";
pub const VERSION: u8 = 2;

/// Smallest header length accepted by default
pub const MIN_HEADER_LEN: u32 = 1;

/// Prelude, version and header length field
const FIXED_PREFIX_LEN: usize = PRELUDE.len() + 1 + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Declared header lengths below this are rejected
    pub min_header_len: u32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            min_header_len: MIN_HEADER_LEN,
        }
    }
}

/// Recipient record with an embedded sender public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EccRecipient {
    pub curve: EllipticCurve,
    pub recipient_public_key: EcPublicKey,
    pub sender_public_key: EcPublicKey,
    pub encrypted_fmk: Vec<u8>,
}

/// Recipient record whose sender key is held by a key capsule server.
/// Recognised when parsing but not decryptable by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyServerRecipient {
    pub curve: EllipticCurve,
    pub recipient_public_key: Vec<u8>,
    pub key_server_id: String,
    pub transaction_id: String,
    pub encrypted_fmk: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Ecc(EccRecipient),
    KeyServer(KeyServerRecipient),
}

/// Result of [`Envelope::parse_header`]
#[derive(Debug, Clone)]
pub struct ParsedHeader {
    pub recipients: Vec<Recipient>,
    /// Exact header bytes as read, the HMAC and AAD input
    pub header: Vec<u8>,
    /// Header HMAC as read (not verified)
    pub hmac: [u8; HMAC_SIZE],
}

impl ParsedHeader {
    pub fn ecc_recipients(&self) -> impl Iterator<Item = &EccRecipient> {
        self.recipients.iter().filter_map(|r| match r {
            Recipient::Ecc(ecc) => Some(ecc),
            Recipient::KeyServer(_) => None,
        })
    }
}

/// A prepared container: recipient records plus the keys derived from the FMK.
/// The derived keys are zeroized when the envelope is dropped.
#[derive(Debug)]
pub struct Envelope {
    recipients: Vec<EccRecipient>,
    hmac_key: HeaderHmacKey,
    cek: ContentEncryptionKey,
}

impl Envelope {
    /// Wrap `fmk` for every recipient using the sender's ephemeral key pair.
    pub fn prepare(
        fmk: &[u8],
        sender: &EcKeyPair,
        recipients: &[EcPublicKey],
    ) -> CryptoResult<Self> {
        if fmk.len() != KEY_SIZE {
            return Err(CryptoError::InvalidArgument(format!(
                "FMK must be {KEY_SIZE} bytes, got {}",
                fmk.len()
            )));
        }
        if recipients.is_empty() {
            return Err(CryptoError::InvalidArgument("at least one recipient is required".into()));
        }
        let fmk = FileMasterKey::from_slice(fmk)?;

        let curve = sender.curve();
        let mut records = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            if recipient.curve() != curve {
                return Err(CryptoError::InvalidArgument(format!(
                    "recipient key is on {}, sender key is on {curve}",
                    recipient.curve()
                )));
            }
            let kek = derive_key_encryption_key(sender, recipient)?;
            records.push(EccRecipient {
                curve,
                recipient_public_key: recipient.clone(),
                sender_public_key: sender.public_key().clone(),
                encrypted_fmk: encrypt_fmk(&fmk, &kek).to_vec(),
            });
        }

        debug!(recipients = records.len(), curve = %curve, "envelope prepared");

        Ok(Self {
            recipients: records,
            hmac_key: derive_header_hmac_key(&fmk)?,
            cek: derive_content_encryption_key(&fmk)?,
        })
    }

    /// Like [`Envelope::prepare`], taking recipients as key material. Only EC
    /// public keys can be carried by this container version.
    pub fn prepare_for_materials(
        fmk: &[u8],
        sender: &EcKeyPair,
        materials: &[EncryptionKeyMaterial],
    ) -> CryptoResult<Self> {
        let keys = materials
            .iter()
            .map(|m| match m.public_key() {
                Some(PublicKey::Ec(key)) => Ok(key.clone()),
                Some(PublicKey::Rsa(_)) => Err(CryptoError::UnsupportedRecipient(format!(
                    "'{}': RSA recipients are not supported",
                    m.label()
                ))),
                None => Err(CryptoError::UnsupportedRecipient(format!(
                    "'{}': {} recipients are not supported",
                    m.label(),
                    m.origin()
                ))),
            })
            .collect::<CryptoResult<Vec<_>>>()?;
        Self::prepare(fmk, sender, &keys)
    }

    pub fn recipients(&self) -> &[EccRecipient] {
        &self.recipients
    }

    /// FlatBuffers header, tables added in the same order the reference
    /// encoder adds them.
    pub fn serialize_header(&self) -> CryptoResult<Vec<u8>> {
        let mut fbb = FlatBufferBuilder::with_capacity(1024);
        let mut records = Vec::with_capacity(self.recipients.len());
        for r in &self.recipients {
            let recipient_tls = encode_tls(r.curve, &r.recipient_public_key)?;
            let sender_tls = encode_tls(r.curve, &r.sender_public_key)?;
            let recipient_key = fbb.create_vector(recipient_tls.as_slice());
            let sender_key = fbb.create_vector(sender_tls.as_slice());

            let mut details = ECCPublicKeyBuilder::new(&mut fbb);
            details.add_sender_public_key(sender_key);
            details.add_recipient_public_key(recipient_key);
            details.add_curve(r.curve.to_fbs());
            let details = details.finish();

            let encrypted_fmk = fbb.create_vector(r.encrypted_fmk.as_slice());

            let mut record = RecipientRecordBuilder::new(&mut fbb);
            record.add_details_type(Details::recipients_ECCPublicKey);
            record.add_details(details.as_union_value());
            record.add_encrypted_fmk(encrypted_fmk);
            record.add_fmk_encryption_method(FMKEncryptionMethod::XOR);
            records.push(record.finish());
        }
        let recipients = fbb.create_vector(records.as_slice());

        let mut header = HeaderBuilder::new(&mut fbb);
        header.add_recipients(recipients);
        header.add_payload_encryption_method(PayloadEncryptionMethod::CHACHA20POLY1305);
        let root = header.finish();
        finish_header_buffer(&mut fbb, root);

        Ok(fbb.finished_data().to_vec())
    }

    /// Write the complete container for `payload` to `output`.
    pub fn encrypt<R: Read, W: Write>(&self, mut payload: R, mut output: W) -> CryptoResult<()> {
        let header = self.serialize_header()?;
        let header_len = u32::try_from(header.len()).map_err(|_| {
            CryptoError::InvalidArgument(format!("header too large: {} bytes", header.len()))
        })?;
        let hmac = header_hmac(&self.hmac_key, &header)?;

        let mut plaintext = zeroize::Zeroizing::new(Vec::new());
        payload.read_to_end(&mut plaintext)?;
        let encrypted = encrypt_payload(&self.cek, &header, &hmac, &plaintext)?;

        output.write_all(PRELUDE)?;
        output.write_all(&[VERSION])?;
        output.write_all(&header_len.to_be_bytes())?;
        output.write_all(&header)?;
        output.write_all(&hmac)?;
        output.write_all(&encrypted)?;
        output.flush()?;

        debug!(
            header_len,
            payload_len = plaintext.len(),
            "container written"
        );
        Ok(())
    }

    /// Read and fully validate the prelude, header and HMAC field, leaving
    /// `input` positioned at the payload. The HMAC is not verified.
    pub fn parse_header<R: Read>(input: &mut R, options: &ParseOptions) -> CryptoResult<ParsedHeader> {
        let (header, hmac) = read_header(input, options)?;
        let recipients = parse_recipients(&open_header(&header)?)?;
        Ok(ParsedHeader {
            recipients,
            header,
            hmac,
        })
    }

    /// Decrypt a container for `recipient`.
    ///
    /// The header HMAC is verified before any payload byte is touched, and
    /// the payload is returned only once its AEAD tag has verified.
    pub fn decrypt<R: Read>(input: R, recipient: &EcKeyPair) -> CryptoResult<Vec<u8>> {
        Self::decrypt_with_options(input, recipient, &ParseOptions::default())
    }

    pub fn decrypt_with_options<R: Read>(
        mut input: R,
        recipient: &EcKeyPair,
        options: &ParseOptions,
    ) -> CryptoResult<Vec<u8>> {
        let (header, hmac) = read_header(&mut input, options)?;
        let table = open_header(&header)?;

        let record = find_record(&table, recipient)?.ok_or(CryptoError::NoMatchingRecipient)?;
        let fmk = recover_fmk(&record, recipient)?;
        let hmac_key = derive_header_hmac_key(&fmk)?;
        verify_header_hmac(&hmac_key, &header, &hmac)?;

        // Authentic from here on; it still has to be a header we support.
        parse_recipients(&table)?;

        let cek = derive_content_encryption_key(&fmk)?;
        let mut encrypted = Vec::new();
        input.read_to_end(&mut encrypted)?;
        let plaintext = decrypt_payload(&cek, &header, &hmac, &encrypted)?;

        debug!(payload_len = plaintext.len(), "container decrypted");
        Ok(plaintext)
    }
}

/// Prelude checks, then the header and the HMAC that must follow it.
fn read_header<R: Read>(
    input: &mut R,
    options: &ParseOptions,
) -> CryptoResult<(Vec<u8>, [u8; HMAC_SIZE])> {
    let mut prefix = [0u8; FIXED_PREFIX_LEN];
    read_exact_or_parse(input, &mut prefix, "container prelude")?;

    if &prefix[..4] != PRELUDE {
        return Err(CryptoError::Parse("not a CDOC container (bad prelude)".into()));
    }
    let version = prefix[4];
    if version != VERSION {
        return Err(CryptoError::Parse(format!(
            "unsupported container version {version}, expected {VERSION}"
        )));
    }
    let header_len = u32::from_be_bytes([prefix[5], prefix[6], prefix[7], prefix[8]]);
    if header_len < options.min_header_len {
        return Err(CryptoError::Parse(format!(
            "header length {header_len} below minimum {}",
            options.min_header_len
        )));
    }

    let needed = u64::from(header_len) + HMAC_SIZE as u64;
    let mut header = Vec::new();
    input.by_ref().take(needed).read_to_end(&mut header)?;
    if header.len() as u64 != needed {
        return Err(CryptoError::Parse(format!(
            "header length {header_len} plus {HMAC_SIZE}-byte HMAC exceeds available {} bytes",
            header.len()
        )));
    }

    let mut hmac = [0u8; HMAC_SIZE];
    hmac.copy_from_slice(&header[header_len as usize..]);
    header.truncate(header_len as usize);
    Ok((header, hmac))
}

fn open_header(header: &[u8]) -> CryptoResult<Header<'_>> {
    root_as_header(header).map_err(|e| CryptoError::Parse(format!("malformed header: {e}")))
}

/// The first ECC record addressed to `recipient`, compared on the raw
/// recipient key bytes.
fn find_record<'a>(
    table: &Header<'a>,
    recipient: &EcKeyPair,
) -> CryptoResult<Option<RecipientRecord<'a>>> {
    let wanted = encode_tls(recipient.curve(), recipient.public_key())?;
    let Some(records) = table.recipients() else {
        return Ok(None);
    };
    Ok(records.iter().find(|record| {
        record
            .details_as_recipients_eccpublic_key()
            .and_then(|details| details.recipient_public_key())
            .is_some_and(|key| bool::from(key.bytes().ct_eq(&wanted)))
    }))
}

/// Unwrap the FMK from a matched record. The header is not authenticated yet,
/// so anything wrong with the record counts as tampering.
fn recover_fmk(record: &RecipientRecord<'_>, recipient: &EcKeyPair) -> CryptoResult<FileMasterKey> {
    let rejected = |what: String| CryptoError::AuthenticationFailure(format!("recipient record: {what}"));

    let sender = record
        .details_as_recipients_eccpublic_key()
        .and_then(|details| details.sender_public_key())
        .ok_or_else(|| rejected("no sender key".into()))?;
    let sender = decode_tls(recipient.curve(), sender.bytes())
        .map_err(|e| rejected(format!("sender key: {e}")))?;

    let encrypted_fmk = record
        .encrypted_fmk()
        .map(|fmk| fmk.bytes())
        .filter(|fmk| fmk.len() == KEY_SIZE)
        .ok_or_else(|| rejected(format!("encrypted FMK is not {KEY_SIZE} bytes")))?;

    let kek = derive_key_decryption_key(recipient, &sender)?;
    decrypt_fmk(encrypted_fmk, &kek)
}

fn parse_recipients(table: &Header<'_>) -> CryptoResult<Vec<Recipient>> {
    let method = table.payload_encryption_method();
    if method != PayloadEncryptionMethod::CHACHA20POLY1305 {
        return Err(CryptoError::Parse(format!(
            "unsupported payload encryption method {}",
            method.0
        )));
    }

    match table.recipients() {
        Some(records) => records.iter().map(|r| parse_recipient(&r)).collect(),
        None => Ok(Vec::new()),
    }
}

fn parse_recipient(record: &RecipientRecord<'_>) -> CryptoResult<Recipient> {
    let method = record.fmk_encryption_method();
    if method != FMKEncryptionMethod::XOR {
        return Err(CryptoError::Parse(format!(
            "unsupported FMK encryption method {}",
            method.0
        )));
    }
    let encrypted_fmk = record
        .encrypted_fmk()
        .ok_or_else(|| CryptoError::Parse("recipient record without encrypted FMK".into()))?
        .bytes();
    if encrypted_fmk.len() != KEY_SIZE {
        return Err(CryptoError::Parse(format!(
            "encrypted FMK must be {KEY_SIZE} bytes, got {}",
            encrypted_fmk.len()
        )));
    }
    let mismatch = |tag: Details| {
        CryptoError::Parse(format!(
            "recipient details do not match details type {}",
            tag.variant_name().unwrap_or("?")
        ))
    };

    match record.details_type() {
        tag @ Details::recipients_ECCPublicKey => {
            let details = record
                .details_as_recipients_eccpublic_key()
                .ok_or_else(|| mismatch(tag))?;
            let curve = EllipticCurve::from_fbs(details.curve())?;
            let recipient_key = details.recipient_public_key().ok_or_else(|| mismatch(tag))?;
            let sender_key = details.sender_public_key().ok_or_else(|| mismatch(tag))?;
            Ok(Recipient::Ecc(EccRecipient {
                curve,
                recipient_public_key: header_key(curve, recipient_key.bytes(), "recipient")?,
                sender_public_key: header_key(curve, sender_key.bytes(), "sender")?,
                encrypted_fmk: encrypted_fmk.to_vec(),
            }))
        }
        tag @ Details::recipients_KeyServer => {
            let details = record
                .details_as_recipients_key_server()
                .ok_or_else(|| mismatch(tag))?;
            let key_server_id = details.keyserver_id().ok_or_else(|| mismatch(tag))?;
            let transaction_id = details.transaction_id().ok_or_else(|| mismatch(tag))?;
            warn!(
                key_server = %key_server_id,
                transaction_id = %transaction_id,
                "key server recipient records are not supported, skipping"
            );
            Ok(Recipient::KeyServer(KeyServerRecipient {
                curve: EllipticCurve::from_fbs(details.curve())?,
                recipient_public_key: details
                    .recipient_public_key()
                    .map(|key| key.bytes().to_vec())
                    .unwrap_or_default(),
                key_server_id: key_server_id.to_owned(),
                transaction_id: transaction_id.to_owned(),
                encrypted_fmk: encrypted_fmk.to_vec(),
            }))
        }
        other => Err(CryptoError::Parse(format!(
            "unknown recipient details type {}",
            other.0
        ))),
    }
}

/// Decode a header key; a bad key is a malformed header.
fn header_key(curve: EllipticCurve, bytes: &[u8], which: &str) -> CryptoResult<EcPublicKey> {
    decode_tls(curve, bytes).map_err(|e| CryptoError::Parse(format!("{which} public key: {e}")))
}

fn read_exact_or_parse<R: Read>(input: &mut R, buf: &mut [u8], what: &str) -> CryptoResult<()> {
    input.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => CryptoError::Parse(format!("truncated container: missing {what}")),
        _ => CryptoError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_fmk;
    use cdoc2_core::fbs::recipients::{EllipticCurve as FbsCurve, KeyServerBuilder};

    fn encrypt_for(recipients: &[&EcKeyPair], payload: &[u8]) -> Vec<u8> {
        let curve = recipients[0].curve();
        let fmk = generate_fmk().unwrap();
        let sender = EcKeyPair::generate(curve).unwrap();
        let keys: Vec<_> = recipients.iter().map(|r| r.public_key().clone()).collect();

        let envelope = Envelope::prepare(fmk.as_bytes(), &sender, &keys).unwrap();
        let mut out = Vec::new();
        envelope.encrypt(payload, &mut out).unwrap();
        out
    }

    fn header_len(container: &[u8]) -> usize {
        u32::from_be_bytes([container[5], container[6], container[7], container[8]]) as usize
    }

    #[test]
    fn test_roundtrip() {
        for curve in EllipticCurve::ALL {
            let recipient = EcKeyPair::generate(curve).unwrap();
            let container = encrypt_for(&[&recipient], b"hello, recipient");

            assert_eq!(&container[..4], b"CDOC");
            assert_eq!(container[4], 2);

            let plaintext = Envelope::decrypt(container.as_slice(), &recipient).unwrap();
            assert_eq!(plaintext, b"hello, recipient");
        }
    }

    #[test]
    fn test_multiple_recipients() {
        let alice = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let bob = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let container = encrypt_for(&[&alice, &bob], b"for both");

        assert_eq!(Envelope::decrypt(container.as_slice(), &alice).unwrap(), b"for both");
        assert_eq!(Envelope::decrypt(container.as_slice(), &bob).unwrap(), b"for both");
    }

    #[test]
    fn test_layout() {
        let recipient = EcKeyPair::generate(EllipticCurve::Secp256r1).unwrap();
        let container = encrypt_for(&[&recipient], b"abc");

        let len = header_len(&container);
        // prefix + header + hmac + nonce + ciphertext + tag
        assert_eq!(container.len(), 9 + len + 32 + 12 + 3 + 16);
    }

    #[test]
    fn test_prepare_rejects_bad_fmk_length() {
        let sender = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let recipient = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let result = Envelope::prepare(&[0u8; 31], &sender, &[recipient.public_key().clone()]);
        assert!(matches!(result, Err(CryptoError::InvalidArgument(_))));
    }

    #[test]
    fn test_prepare_rejects_mixed_curves() {
        let sender = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let recipient = EcKeyPair::generate(EllipticCurve::Secp256r1).unwrap();
        let result = Envelope::prepare(&[0u8; 32], &sender, &[recipient.public_key().clone()]);
        assert!(matches!(result, Err(CryptoError::InvalidArgument(_))));
    }

    #[test]
    fn test_prepare_for_materials_rejects_secrets() {
        let sender = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let material = EncryptionKeyMaterial::from_secret(vec![1; 32], "shared").unwrap();
        let result = Envelope::prepare_for_materials(&[0u8; 32], &sender, &[material]);
        assert!(matches!(result, Err(CryptoError::UnsupportedRecipient(_))));
    }

    #[test]
    fn test_prepare_for_materials() {
        let sender = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let recipient = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let material =
            EncryptionKeyMaterial::from_public_key(recipient.public_key().clone(), "recipient");
        let fmk = generate_fmk().unwrap();

        let envelope = Envelope::prepare_for_materials(fmk.as_bytes(), &sender, &[material]).unwrap();
        assert_eq!(envelope.recipients().len(), 1);
        assert_eq!(&envelope.recipients()[0].recipient_public_key, recipient.public_key());
    }

    #[test]
    fn test_no_matching_recipient() {
        let recipient = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let stranger = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let container = encrypt_for(&[&recipient], b"secret");

        let result = Envelope::decrypt(container.as_slice(), &stranger);
        assert!(matches!(result, Err(CryptoError::NoMatchingRecipient)));

        let other_curve = EcKeyPair::generate(EllipticCurve::Secp256r1).unwrap();
        let result = Envelope::decrypt(container.as_slice(), &other_curve);
        assert!(matches!(result, Err(CryptoError::NoMatchingRecipient)));
    }

    #[test]
    fn test_parse_header_lists_recipients() {
        let recipient = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let container = encrypt_for(&[&recipient], b"x");

        let mut input = container.as_slice();
        let parsed = Envelope::parse_header(&mut input, &ParseOptions::default()).unwrap();
        assert_eq!(parsed.recipients.len(), 1);
        let ecc: Vec<_> = parsed.ecc_recipients().collect();
        assert_eq!(&ecc[0].recipient_public_key, recipient.public_key());
        assert_eq!(ecc[0].encrypted_fmk.len(), KEY_SIZE);
        let len = header_len(&container);
        assert_eq!(parsed.header, &container[9..9 + len]);
        assert_eq!(parsed.hmac, &container[9 + len..9 + len + HMAC_SIZE]);
        // input is left at the payload
        assert_eq!(input.len(), 12 + 1 + 16);
    }

    #[test]
    fn test_parse_header_requires_hmac() {
        let recipient = EcKeyPair::generate(EllipticCurve::Secp256r1).unwrap();
        let container = encrypt_for(&[&recipient], b"x");
        let len = header_len(&container);

        for cut in [9 + len, 9 + len + 1, 9 + len + HMAC_SIZE - 1] {
            let result = parse(&container[..cut]);
            assert!(matches!(result, Err(CryptoError::Parse(_))), "cut at {cut}");
        }
        assert!(parse(&container[..9 + len + HMAC_SIZE]).is_ok());
    }

    #[test]
    fn test_bad_prelude() {
        let recipient = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let mut container = encrypt_for(&[&recipient], b"x");
        container[0] = b'X';

        let result = Envelope::decrypt(container.as_slice(), &recipient);
        assert!(matches!(result, Err(CryptoError::Parse(_))));
    }

    #[test]
    fn test_bad_version() {
        let recipient = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let mut container = encrypt_for(&[&recipient], b"x");
        container[4] = 1;

        let result = Envelope::decrypt(container.as_slice(), &recipient);
        assert!(matches!(result, Err(CryptoError::Parse(_))));
    }

    #[test]
    fn test_truncated_inputs() {
        let recipient = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let container = encrypt_for(&[&recipient], b"x");
        let len = header_len(&container);

        // too short for the prelude
        let result = Envelope::decrypt(&container[..5], &recipient);
        assert!(matches!(result, Err(CryptoError::Parse(_))));

        // header length exceeds available bytes
        let result = Envelope::decrypt(&container[..9 + len - 1], &recipient);
        assert!(matches!(result, Err(CryptoError::Parse(_))));

        // missing HMAC
        let result = Envelope::decrypt(&container[..9 + len + 10], &recipient);
        assert!(matches!(result, Err(CryptoError::Parse(_))));
    }

    #[test]
    fn test_header_length_below_minimum() {
        let mut container = Vec::new();
        container.extend_from_slice(PRELUDE);
        container.push(VERSION);
        container.extend_from_slice(&0u32.to_be_bytes());
        container.extend_from_slice(&[0u8; 64]);

        let mut input = container.as_slice();
        let result = Envelope::parse_header(&mut input, &ParseOptions::default());
        assert!(matches!(result, Err(CryptoError::Parse(_))));

        let strict = ParseOptions { min_header_len: 100 };
        let recipient = EcKeyPair::generate(EllipticCurve::Secp256r1).unwrap();
        let container = encrypt_for(&[&recipient], b"x");
        assert!(header_len(&container) > 100);
        let mut input = container.as_slice();
        assert!(Envelope::parse_header(&mut input, &strict).is_ok());
    }

    enum TestDetails<'k> {
        Ecc {
            curve: FbsCurve,
            recipient: &'k [u8],
            sender: &'k [u8],
        },
        KeyServer {
            curve: FbsCurve,
            recipient: &'k [u8],
            server: &'k str,
            transaction: &'k str,
        },
    }

    struct TestRecord<'k> {
        details_type: Details,
        details: Option<TestDetails<'k>>,
        encrypted_fmk: Vec<u8>,
        fmk_method: FMKEncryptionMethod,
    }

    impl<'k> TestRecord<'k> {
        fn ecc(curve: EllipticCurve, recipient: &'k [u8], sender: &'k [u8]) -> Self {
            Self {
                details_type: Details::recipients_ECCPublicKey,
                details: Some(TestDetails::Ecc {
                    curve: curve.to_fbs(),
                    recipient,
                    sender,
                }),
                encrypted_fmk: vec![0u8; KEY_SIZE],
                fmk_method: FMKEncryptionMethod::XOR,
            }
        }
    }

    fn header_bytes(records: &[TestRecord<'_>], payload_method: PayloadEncryptionMethod) -> Vec<u8> {
        let mut fbb = FlatBufferBuilder::new();
        let mut offsets = Vec::new();
        for r in records {
            let details = match &r.details {
                Some(TestDetails::Ecc {
                    curve,
                    recipient,
                    sender,
                }) => {
                    let recipient = fbb.create_vector(*recipient);
                    let sender = fbb.create_vector(*sender);
                    let mut b = ECCPublicKeyBuilder::new(&mut fbb);
                    b.add_curve(*curve);
                    b.add_recipient_public_key(recipient);
                    b.add_sender_public_key(sender);
                    Some(b.finish().as_union_value())
                }
                Some(TestDetails::KeyServer {
                    curve,
                    recipient,
                    server,
                    transaction,
                }) => {
                    let recipient = fbb.create_vector(*recipient);
                    let server = fbb.create_string(server);
                    let transaction = fbb.create_string(transaction);
                    let mut b = KeyServerBuilder::new(&mut fbb);
                    b.add_curve(*curve);
                    b.add_recipient_public_key(recipient);
                    b.add_keyserver_id(server);
                    b.add_transaction_id(transaction);
                    Some(b.finish().as_union_value())
                }
                None => None,
            };
            let fmk = fbb.create_vector(r.encrypted_fmk.as_slice());
            let mut b = RecipientRecordBuilder::new(&mut fbb);
            b.add_details_type(r.details_type);
            if let Some(details) = details {
                b.add_details(details);
            }
            b.add_encrypted_fmk(fmk);
            b.add_fmk_encryption_method(r.fmk_method);
            offsets.push(b.finish());
        }
        let recipients = fbb.create_vector(offsets.as_slice());
        let mut b = HeaderBuilder::new(&mut fbb);
        b.add_recipients(recipients);
        b.add_payload_encryption_method(payload_method);
        let root = b.finish();
        finish_header_buffer(&mut fbb, root);
        fbb.finished_data().to_vec()
    }

    fn frame(header: &[u8], hmac: &[u8; HMAC_SIZE], payload: &[u8]) -> Vec<u8> {
        let mut container = Vec::new();
        container.extend_from_slice(PRELUDE);
        container.push(VERSION);
        container.extend_from_slice(&(header.len() as u32).to_be_bytes());
        container.extend_from_slice(header);
        container.extend_from_slice(hmac);
        container.extend_from_slice(payload);
        container
    }

    /// Container around `records` with a zero HMAC
    fn container_with(records: &[TestRecord<'_>]) -> Vec<u8> {
        let header = header_bytes(records, PayloadEncryptionMethod::CHACHA20POLY1305);
        frame(&header, &[0u8; HMAC_SIZE], &[])
    }

    fn parse(container: &[u8]) -> CryptoResult<ParsedHeader> {
        let mut input = container;
        Envelope::parse_header(&mut input, &ParseOptions::default())
    }

    #[test]
    fn test_unknown_details_type_rejected() {
        let pair = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let tls = encode_tls(pair.curve(), pair.public_key()).unwrap();
        let mut record = TestRecord::ecc(pair.curve(), &tls, &tls);
        record.details_type = Details(7);
        let container = container_with(&[record]);

        assert!(matches!(parse(&container), Err(CryptoError::Parse(_))));
        // an unknown tag is never read as an ECC record
        let result = Envelope::decrypt(container.as_slice(), &pair);
        assert!(matches!(result, Err(CryptoError::NoMatchingRecipient)));
    }

    #[test]
    fn test_none_details_type_rejected() {
        let pair = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let tls = encode_tls(pair.curve(), pair.public_key()).unwrap();
        let mut record = TestRecord::ecc(pair.curve(), &tls, &tls);
        record.details_type = Details::NONE;
        record.details = None;

        assert!(matches!(
            parse(&container_with(&[record])),
            Err(CryptoError::Parse(_))
        ));
    }

    #[test]
    fn test_union_tag_without_value_rejected() {
        let pair = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let tls = encode_tls(pair.curve(), pair.public_key()).unwrap();
        let mut record = TestRecord::ecc(pair.curve(), &tls, &tls);
        record.details = None;
        let container = container_with(&[record]);

        assert!(matches!(parse(&container), Err(CryptoError::Parse(_))));
        assert!(matches!(
            Envelope::decrypt(container.as_slice(), &pair),
            Err(CryptoError::Parse(_))
        ));
    }

    #[test]
    fn test_key_server_record_recognised() {
        let pair = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let tls = encode_tls(pair.curve(), pair.public_key()).unwrap();
        let record = TestRecord {
            details_type: Details::recipients_KeyServer,
            details: Some(TestDetails::KeyServer {
                curve: FbsCurve::secp384r1,
                recipient: &tls,
                server: "ria",
                transaction: "KC0123456789abcdef0123456789abcdef",
            }),
            encrypted_fmk: vec![0u8; KEY_SIZE],
            fmk_method: FMKEncryptionMethod::XOR,
        };
        let container = container_with(&[record]);

        let parsed = parse(&container).unwrap();
        match &parsed.recipients[0] {
            Recipient::KeyServer(r) => {
                assert_eq!(r.key_server_id, "ria");
                assert_eq!(r.transaction_id, "KC0123456789abcdef0123456789abcdef");
                assert_eq!(r.curve, EllipticCurve::Secp384r1);
                assert_eq!(r.recipient_public_key, tls);
            }
            other => panic!("expected key server record, got {other:?}"),
        }
        assert_eq!(parsed.ecc_recipients().count(), 0);

        // recognised, but there is nothing this key can decrypt
        let result = Envelope::decrypt(container.as_slice(), &pair);
        assert!(matches!(result, Err(CryptoError::NoMatchingRecipient)));
    }

    #[test]
    fn test_wrong_fmk_length() {
        let pair = EcKeyPair::generate(EllipticCurve::Secp256r1).unwrap();
        let tls = encode_tls(pair.curve(), pair.public_key()).unwrap();
        let mut record = TestRecord::ecc(pair.curve(), &tls, &tls);
        record.encrypted_fmk = vec![0u8; 16];
        let container = container_with(&[record]);

        assert!(matches!(parse(&container), Err(CryptoError::Parse(_))));
        // the matched record is unusable before the HMAC can be checked
        assert!(matches!(
            Envelope::decrypt(container.as_slice(), &pair),
            Err(CryptoError::AuthenticationFailure(_))
        ));
    }

    #[test]
    fn test_wrong_fmk_method() {
        let pair = EcKeyPair::generate(EllipticCurve::Secp256r1).unwrap();
        let tls = encode_tls(pair.curve(), pair.public_key()).unwrap();
        let mut record = TestRecord::ecc(pair.curve(), &tls, &tls);
        record.fmk_method = FMKEncryptionMethod::UNKNOWN;
        let container = container_with(&[record]);

        assert!(matches!(parse(&container), Err(CryptoError::Parse(_))));
        assert!(matches!(
            Envelope::decrypt(container.as_slice(), &pair),
            Err(CryptoError::AuthenticationFailure(_))
        ));
    }

    #[test]
    fn test_wrong_payload_method() {
        let pair = EcKeyPair::generate(EllipticCurve::Secp256r1).unwrap();
        let tls = encode_tls(pair.curve(), pair.public_key()).unwrap();
        let header = header_bytes(
            &[TestRecord::ecc(pair.curve(), &tls, &tls)],
            PayloadEncryptionMethod::UNKNOWN,
        );
        let container = frame(&header, &[0u8; HMAC_SIZE], &[]);

        assert!(matches!(parse(&container), Err(CryptoError::Parse(_))));
        assert!(matches!(
            Envelope::decrypt(container.as_slice(), &pair),
            Err(CryptoError::AuthenticationFailure(_))
        ));
    }

    #[test]
    fn test_malformed_header_keys() {
        let pair = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let tls = encode_tls(pair.curve(), pair.public_key()).unwrap();
        let mut bogus = tls.clone();
        bogus[0] = 0x05;

        // strict parse reports bad keys as framing errors
        let container = container_with(&[TestRecord::ecc(pair.curve(), &bogus, &tls)]);
        assert!(matches!(parse(&container), Err(CryptoError::Parse(_))));
        let container = container_with(&[TestRecord::ecc(pair.curve(), &tls, &bogus)]);
        assert!(matches!(parse(&container), Err(CryptoError::Parse(_))));

        // decrypt: the record matches, its sender key is unusable
        assert!(matches!(
            Envelope::decrypt(container.as_slice(), &pair),
            Err(CryptoError::AuthenticationFailure(_))
        ));
    }

    #[test]
    fn test_authentic_header_is_still_validated() {
        let pair = EcKeyPair::generate(EllipticCurve::Secp256r1).unwrap();
        let sender = EcKeyPair::generate(EllipticCurve::Secp256r1).unwrap();
        let fmk = generate_fmk().unwrap();
        let kek = derive_key_encryption_key(&sender, pair.public_key()).unwrap();

        let recipient_tls = encode_tls(pair.curve(), pair.public_key()).unwrap();
        let sender_tls = encode_tls(sender.curve(), sender.public_key()).unwrap();
        let mut ours = TestRecord::ecc(pair.curve(), &recipient_tls, &sender_tls);
        ours.encrypted_fmk = encrypt_fmk(&fmk, &kek).to_vec();
        let mut unknown = TestRecord::ecc(pair.curve(), &sender_tls, &sender_tls);
        unknown.details_type = Details(9);

        let header = header_bytes(&[ours, unknown], PayloadEncryptionMethod::CHACHA20POLY1305);
        let hmac = header_hmac(&derive_header_hmac_key(&fmk).unwrap(), &header).unwrap();
        let cek = derive_content_encryption_key(&fmk).unwrap();
        let payload = encrypt_payload(&cek, &header, &hmac, b"x").unwrap();
        let container = frame(&header, &hmac, &payload);

        // HMAC verifies, the second record is still not something we accept
        assert!(matches!(
            Envelope::decrypt(container.as_slice(), &pair),
            Err(CryptoError::Parse(_))
        ));
    }

    #[test]
    fn test_tampered_hmac() {
        let recipient = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let mut container = encrypt_for(&[&recipient], b"payload");
        let hmac_offset = 9 + header_len(&container);
        container[hmac_offset] ^= 0x01;

        let result = Envelope::decrypt(container.as_slice(), &recipient);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailure(_))));
    }

    #[test]
    fn test_tampered_payload() {
        let recipient = EcKeyPair::generate(EllipticCurve::Secp384r1).unwrap();
        let mut container = encrypt_for(&[&recipient], b"payload");
        let last = container.len() - 1;
        container[last] ^= 0x80;

        let result = Envelope::decrypt(container.as_slice(), &recipient);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailure(_))));
    }
}
