//! `header.fbs`

use flatbuffers::{FlatBufferBuilder, ForwardsUOffset, Table, Vector, VOffsetT, WIPOffset};

use super::recipients::{ECCPublicKey, KeyServer};

fbs_enum! {
    /// Union tag of [`RecipientRecord::details`].
    Details: u8 {
        NONE = 0,
        recipients_ECCPublicKey = 1,
        recipients_KeyServer = 2,
    }
}

fbs_enum! {
    FMKEncryptionMethod: i8 {
        UNKNOWN = 0,
        XOR = 1,
    }
}

fbs_enum! {
    PayloadEncryptionMethod: i8 {
        UNKNOWN = 0,
        CHACHA20POLY1305 = 1,
    }
}

// ── RecipientRecord ─────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq)]
pub struct RecipientRecord<'a> {
    pub _tab: Table<'a>,
}

impl<'a> flatbuffers::Follow<'a> for RecipientRecord<'a> {
    type Inner = RecipientRecord<'a>;
    #[inline]
    unsafe fn follow(buf: &'a [u8], loc: usize) -> Self::Inner {
        Self {
            _tab: Table::new(buf, loc),
        }
    }
}

impl<'a> RecipientRecord<'a> {
    pub const VT_DETAILS_TYPE: VOffsetT = 4;
    pub const VT_DETAILS: VOffsetT = 6;
    pub const VT_ENCRYPTED_FMK: VOffsetT = 8;
    pub const VT_FMK_ENCRYPTION_METHOD: VOffsetT = 10;

    #[inline]
    pub fn details_type(&self) -> Details {
        unsafe {
            self._tab
                .get::<Details>(Self::VT_DETAILS_TYPE, Some(Details::NONE))
                .unwrap_or_default()
        }
    }

    #[inline]
    pub fn details(&self) -> Option<Table<'a>> {
        unsafe { self._tab.get::<ForwardsUOffset<Table<'a>>>(Self::VT_DETAILS, None) }
    }

    #[inline]
    pub fn encrypted_fmk(&self) -> Option<Vector<'a, u8>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, u8>>>(Self::VT_ENCRYPTED_FMK, None)
        }
    }

    #[inline]
    pub fn fmk_encryption_method(&self) -> FMKEncryptionMethod {
        unsafe {
            self._tab
                .get::<FMKEncryptionMethod>(
                    Self::VT_FMK_ENCRYPTION_METHOD,
                    Some(FMKEncryptionMethod::UNKNOWN),
                )
                .unwrap_or_default()
        }
    }

    #[inline]
    pub fn details_as_recipients_eccpublic_key(&self) -> Option<ECCPublicKey<'a>> {
        if self.details_type() == Details::recipients_ECCPublicKey {
            // SAFETY: the verifier checked the union member against its tag.
            self.details().map(|t| unsafe { ECCPublicKey::init_from_table(t) })
        } else {
            None
        }
    }

    #[inline]
    pub fn details_as_recipients_key_server(&self) -> Option<KeyServer<'a>> {
        if self.details_type() == Details::recipients_KeyServer {
            // SAFETY: as above.
            self.details().map(|t| unsafe { KeyServer::init_from_table(t) })
        } else {
            None
        }
    }
}

impl flatbuffers::Verifiable for RecipientRecord<'_> {
    #[inline]
    fn run_verifier(
        v: &mut flatbuffers::Verifier,
        pos: usize,
    ) -> Result<(), flatbuffers::InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_union::<Details, _>(
                "details_type",
                Self::VT_DETAILS_TYPE,
                "details",
                Self::VT_DETAILS,
                false,
                |key, v, pos| match key {
                    Details::recipients_ECCPublicKey => v
                        .verify_union_variant::<ForwardsUOffset<ECCPublicKey>>(
                            "Details::recipients_ECCPublicKey",
                            pos,
                        ),
                    Details::recipients_KeyServer => v
                        .verify_union_variant::<ForwardsUOffset<KeyServer>>(
                            "Details::recipients_KeyServer",
                            pos,
                        ),
                    _ => Ok(()),
                },
            )?
            .visit_field::<ForwardsUOffset<Vector<'_, u8>>>(
                "encrypted_fmk",
                Self::VT_ENCRYPTED_FMK,
                true,
            )?
            .visit_field::<FMKEncryptionMethod>(
                "fmk_encryption_method",
                Self::VT_FMK_ENCRYPTION_METHOD,
                false,
            )?
            .finish();
        Ok(())
    }
}

pub struct RecipientRecordBuilder<'a: 'b, 'b> {
    fbb_: &'b mut FlatBufferBuilder<'a>,
    start_: WIPOffset<flatbuffers::TableUnfinishedWIPOffset>,
}

impl<'a: 'b, 'b> RecipientRecordBuilder<'a, 'b> {
    #[inline]
    pub fn new(fbb: &'b mut FlatBufferBuilder<'a>) -> Self {
        let start = fbb.start_table();
        RecipientRecordBuilder {
            fbb_: fbb,
            start_: start,
        }
    }

    #[inline]
    pub fn add_details_type(&mut self, details_type: Details) {
        self.fbb_.push_slot::<Details>(
            RecipientRecord::VT_DETAILS_TYPE,
            details_type,
            Details::NONE,
        );
    }

    #[inline]
    pub fn add_details(&mut self, details: WIPOffset<flatbuffers::UnionWIPOffset>) {
        self.fbb_
            .push_slot_always::<WIPOffset<_>>(RecipientRecord::VT_DETAILS, details);
    }

    #[inline]
    pub fn add_encrypted_fmk(&mut self, fmk: WIPOffset<Vector<'b, u8>>) {
        self.fbb_
            .push_slot_always::<WIPOffset<_>>(RecipientRecord::VT_ENCRYPTED_FMK, fmk);
    }

    #[inline]
    pub fn add_fmk_encryption_method(&mut self, method: FMKEncryptionMethod) {
        self.fbb_.push_slot::<FMKEncryptionMethod>(
            RecipientRecord::VT_FMK_ENCRYPTION_METHOD,
            method,
            FMKEncryptionMethod::UNKNOWN,
        );
    }

    #[inline]
    pub fn finish(self) -> WIPOffset<RecipientRecord<'a>> {
        let o = self.fbb_.end_table(self.start_);
        self.fbb_
            .required(o, RecipientRecord::VT_ENCRYPTED_FMK, "encrypted_fmk");
        WIPOffset::new(o.value())
    }
}

// ── Header ──────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq)]
pub struct Header<'a> {
    pub _tab: Table<'a>,
}

impl<'a> flatbuffers::Follow<'a> for Header<'a> {
    type Inner = Header<'a>;
    #[inline]
    unsafe fn follow(buf: &'a [u8], loc: usize) -> Self::Inner {
        Self {
            _tab: Table::new(buf, loc),
        }
    }
}

impl<'a> Header<'a> {
    pub const VT_RECIPIENTS: VOffsetT = 4;
    pub const VT_PAYLOAD_ENCRYPTION_METHOD: VOffsetT = 6;

    #[inline]
    pub fn recipients(&self) -> Option<Vector<'a, ForwardsUOffset<RecipientRecord<'a>>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, ForwardsUOffset<RecipientRecord>>>>(
                    Self::VT_RECIPIENTS,
                    None,
                )
        }
    }

    #[inline]
    pub fn payload_encryption_method(&self) -> PayloadEncryptionMethod {
        unsafe {
            self._tab
                .get::<PayloadEncryptionMethod>(
                    Self::VT_PAYLOAD_ENCRYPTION_METHOD,
                    Some(PayloadEncryptionMethod::UNKNOWN),
                )
                .unwrap_or_default()
        }
    }
}

impl flatbuffers::Verifiable for Header<'_> {
    #[inline]
    fn run_verifier(
        v: &mut flatbuffers::Verifier,
        pos: usize,
    ) -> Result<(), flatbuffers::InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<Vector<'_, ForwardsUOffset<RecipientRecord>>>>(
                "recipients",
                Self::VT_RECIPIENTS,
                false,
            )?
            .visit_field::<PayloadEncryptionMethod>(
                "payload_encryption_method",
                Self::VT_PAYLOAD_ENCRYPTION_METHOD,
                false,
            )?
            .finish();
        Ok(())
    }
}

pub struct HeaderBuilder<'a: 'b, 'b> {
    fbb_: &'b mut FlatBufferBuilder<'a>,
    start_: WIPOffset<flatbuffers::TableUnfinishedWIPOffset>,
}

impl<'a: 'b, 'b> HeaderBuilder<'a, 'b> {
    #[inline]
    pub fn new(fbb: &'b mut FlatBufferBuilder<'a>) -> Self {
        let start = fbb.start_table();
        HeaderBuilder {
            fbb_: fbb,
            start_: start,
        }
    }

    #[inline]
    pub fn add_recipients(
        &mut self,
        recipients: WIPOffset<Vector<'b, ForwardsUOffset<RecipientRecord<'b>>>>,
    ) {
        self.fbb_
            .push_slot_always::<WIPOffset<_>>(Header::VT_RECIPIENTS, recipients);
    }

    #[inline]
    pub fn add_payload_encryption_method(&mut self, method: PayloadEncryptionMethod) {
        self.fbb_.push_slot::<PayloadEncryptionMethod>(
            Header::VT_PAYLOAD_ENCRYPTION_METHOD,
            method,
            PayloadEncryptionMethod::UNKNOWN,
        );
    }

    #[inline]
    pub fn finish(self) -> WIPOffset<Header<'a>> {
        let o = self.fbb_.end_table(self.start_);
        WIPOffset::new(o.value())
    }
}

/// Verifies `buf` and returns its root [`Header`].
#[inline]
pub fn root_as_header(buf: &[u8]) -> Result<Header<'_>, flatbuffers::InvalidFlatbuffer> {
    flatbuffers::root::<Header>(buf)
}

#[inline]
pub fn finish_header_buffer<'a, 'b>(
    fbb: &'b mut FlatBufferBuilder<'a>,
    root: WIPOffset<Header<'a>>,
) {
    fbb.finish(root, None);
}
