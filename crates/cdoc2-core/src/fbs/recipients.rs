//! `recipients.fbs`

use flatbuffers::{FlatBufferBuilder, ForwardsUOffset, Table, Vector, VOffsetT, WIPOffset};

fbs_enum! {
    EllipticCurve: i8 {
        UNKNOWN = 0,
        secp384r1 = 1,
        secp256r1 = 2,
    }
}

// ── ECCPublicKey ────────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq)]
pub struct ECCPublicKey<'a> {
    pub _tab: Table<'a>,
}

impl<'a> flatbuffers::Follow<'a> for ECCPublicKey<'a> {
    type Inner = ECCPublicKey<'a>;
    #[inline]
    unsafe fn follow(buf: &'a [u8], loc: usize) -> Self::Inner {
        Self {
            _tab: Table::new(buf, loc),
        }
    }
}

impl<'a> ECCPublicKey<'a> {
    pub const VT_CURVE: VOffsetT = 4;
    pub const VT_RECIPIENT_PUBLIC_KEY: VOffsetT = 6;
    pub const VT_SENDER_PUBLIC_KEY: VOffsetT = 8;

    /// # Safety
    /// `table` must come from a verified buffer.
    #[inline]
    pub unsafe fn init_from_table(table: Table<'a>) -> Self {
        ECCPublicKey { _tab: table }
    }

    #[inline]
    pub fn curve(&self) -> EllipticCurve {
        unsafe {
            self._tab
                .get::<EllipticCurve>(Self::VT_CURVE, Some(EllipticCurve::UNKNOWN))
                .unwrap_or_default()
        }
    }

    #[inline]
    pub fn recipient_public_key(&self) -> Option<Vector<'a, u8>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, u8>>>(Self::VT_RECIPIENT_PUBLIC_KEY, None)
        }
    }

    #[inline]
    pub fn sender_public_key(&self) -> Option<Vector<'a, u8>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, u8>>>(Self::VT_SENDER_PUBLIC_KEY, None)
        }
    }
}

impl flatbuffers::Verifiable for ECCPublicKey<'_> {
    #[inline]
    fn run_verifier(
        v: &mut flatbuffers::Verifier,
        pos: usize,
    ) -> Result<(), flatbuffers::InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<EllipticCurve>("curve", Self::VT_CURVE, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, u8>>>(
                "recipient_public_key",
                Self::VT_RECIPIENT_PUBLIC_KEY,
                true,
            )?
            .visit_field::<ForwardsUOffset<Vector<'_, u8>>>(
                "sender_public_key",
                Self::VT_SENDER_PUBLIC_KEY,
                true,
            )?
            .finish();
        Ok(())
    }
}

pub struct ECCPublicKeyBuilder<'a: 'b, 'b> {
    fbb_: &'b mut FlatBufferBuilder<'a>,
    start_: WIPOffset<flatbuffers::TableUnfinishedWIPOffset>,
}

impl<'a: 'b, 'b> ECCPublicKeyBuilder<'a, 'b> {
    #[inline]
    pub fn new(fbb: &'b mut FlatBufferBuilder<'a>) -> Self {
        let start = fbb.start_table();
        ECCPublicKeyBuilder {
            fbb_: fbb,
            start_: start,
        }
    }

    #[inline]
    pub fn add_curve(&mut self, curve: EllipticCurve) {
        self.fbb_
            .push_slot::<EllipticCurve>(ECCPublicKey::VT_CURVE, curve, EllipticCurve::UNKNOWN);
    }

    #[inline]
    pub fn add_recipient_public_key(&mut self, key: WIPOffset<Vector<'b, u8>>) {
        self.fbb_
            .push_slot_always::<WIPOffset<_>>(ECCPublicKey::VT_RECIPIENT_PUBLIC_KEY, key);
    }

    #[inline]
    pub fn add_sender_public_key(&mut self, key: WIPOffset<Vector<'b, u8>>) {
        self.fbb_
            .push_slot_always::<WIPOffset<_>>(ECCPublicKey::VT_SENDER_PUBLIC_KEY, key);
    }

    #[inline]
    pub fn finish(self) -> WIPOffset<ECCPublicKey<'a>> {
        let o = self.fbb_.end_table(self.start_);
        self.fbb_
            .required(o, ECCPublicKey::VT_RECIPIENT_PUBLIC_KEY, "recipient_public_key");
        self.fbb_
            .required(o, ECCPublicKey::VT_SENDER_PUBLIC_KEY, "sender_public_key");
        WIPOffset::new(o.value())
    }
}

// ── KeyServer ───────────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq)]
pub struct KeyServer<'a> {
    pub _tab: Table<'a>,
}

impl<'a> flatbuffers::Follow<'a> for KeyServer<'a> {
    type Inner = KeyServer<'a>;
    #[inline]
    unsafe fn follow(buf: &'a [u8], loc: usize) -> Self::Inner {
        Self {
            _tab: Table::new(buf, loc),
        }
    }
}

impl<'a> KeyServer<'a> {
    pub const VT_CURVE: VOffsetT = 4;
    pub const VT_RECIPIENT_PUBLIC_KEY: VOffsetT = 6;
    pub const VT_KEYSERVER_ID: VOffsetT = 8;
    pub const VT_TRANSACTION_ID: VOffsetT = 10;

    /// # Safety
    /// `table` must come from a verified buffer.
    #[inline]
    pub unsafe fn init_from_table(table: Table<'a>) -> Self {
        KeyServer { _tab: table }
    }

    #[inline]
    pub fn curve(&self) -> EllipticCurve {
        unsafe {
            self._tab
                .get::<EllipticCurve>(Self::VT_CURVE, Some(EllipticCurve::UNKNOWN))
                .unwrap_or_default()
        }
    }

    #[inline]
    pub fn recipient_public_key(&self) -> Option<Vector<'a, u8>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, u8>>>(Self::VT_RECIPIENT_PUBLIC_KEY, None)
        }
    }

    #[inline]
    pub fn keyserver_id(&self) -> Option<&'a str> {
        unsafe { self._tab.get::<ForwardsUOffset<&str>>(Self::VT_KEYSERVER_ID, None) }
    }

    #[inline]
    pub fn transaction_id(&self) -> Option<&'a str> {
        unsafe { self._tab.get::<ForwardsUOffset<&str>>(Self::VT_TRANSACTION_ID, None) }
    }
}

impl flatbuffers::Verifiable for KeyServer<'_> {
    #[inline]
    fn run_verifier(
        v: &mut flatbuffers::Verifier,
        pos: usize,
    ) -> Result<(), flatbuffers::InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<EllipticCurve>("curve", Self::VT_CURVE, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, u8>>>(
                "recipient_public_key",
                Self::VT_RECIPIENT_PUBLIC_KEY,
                true,
            )?
            .visit_field::<ForwardsUOffset<&str>>("keyserver_id", Self::VT_KEYSERVER_ID, true)?
            .visit_field::<ForwardsUOffset<&str>>(
                "transaction_id",
                Self::VT_TRANSACTION_ID,
                true,
            )?
            .finish();
        Ok(())
    }
}

pub struct KeyServerBuilder<'a: 'b, 'b> {
    fbb_: &'b mut FlatBufferBuilder<'a>,
    start_: WIPOffset<flatbuffers::TableUnfinishedWIPOffset>,
}

impl<'a: 'b, 'b> KeyServerBuilder<'a, 'b> {
    #[inline]
    pub fn new(fbb: &'b mut FlatBufferBuilder<'a>) -> Self {
        let start = fbb.start_table();
        KeyServerBuilder {
            fbb_: fbb,
            start_: start,
        }
    }

    #[inline]
    pub fn add_curve(&mut self, curve: EllipticCurve) {
        self.fbb_
            .push_slot::<EllipticCurve>(KeyServer::VT_CURVE, curve, EllipticCurve::UNKNOWN);
    }

    #[inline]
    pub fn add_recipient_public_key(&mut self, key: WIPOffset<Vector<'b, u8>>) {
        self.fbb_
            .push_slot_always::<WIPOffset<_>>(KeyServer::VT_RECIPIENT_PUBLIC_KEY, key);
    }

    #[inline]
    pub fn add_keyserver_id(&mut self, id: WIPOffset<&'b str>) {
        self.fbb_
            .push_slot_always::<WIPOffset<_>>(KeyServer::VT_KEYSERVER_ID, id);
    }

    #[inline]
    pub fn add_transaction_id(&mut self, id: WIPOffset<&'b str>) {
        self.fbb_
            .push_slot_always::<WIPOffset<_>>(KeyServer::VT_TRANSACTION_ID, id);
    }

    #[inline]
    pub fn finish(self) -> WIPOffset<KeyServer<'a>> {
        let o = self.fbb_.end_table(self.start_);
        self.fbb_
            .required(o, KeyServer::VT_RECIPIENT_PUBLIC_KEY, "recipient_public_key");
        self.fbb_.required(o, KeyServer::VT_KEYSERVER_ID, "keyserver_id");
        self.fbb_.required(o, KeyServer::VT_TRANSACTION_ID, "transaction_id");
        WIPOffset::new(o.value())
    }
}
