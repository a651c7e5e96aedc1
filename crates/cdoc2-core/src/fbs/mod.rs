//! Container header tables (FlatBuffers).
//!
//! Schemas: `header.fbs` and `recipients.fbs` next to this file. The modules
//! below follow the layout `flatc --rust` produces for them; vtable slot
//! offsets must stay in step with the field order in the schemas.
//!
//! Table accessors read through unchecked offsets. Only hand a table buffer
//! that went through [`header::root_as_header`] (which runs the verifier).

#![allow(clippy::needless_lifetimes, clippy::extra_unused_lifetimes)]

/// One-byte schema enum: a transparent newtype so unknown values survive a
/// read and can be reported instead of silently mapped.
macro_rules! fbs_enum {
    ($(#[$meta:meta])* $name:ident : $repr:ty { $($variant:ident = $value:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(pub $repr);

        #[allow(non_upper_case_globals)]
        impl $name {
            $(pub const $variant: Self = Self($value);)+
            pub const ENUM_VALUES: &'static [Self] = &[$(Self::$variant),+];

            pub fn variant_name(self) -> Option<&'static str> {
                match self {
                    $(Self::$variant => Some(stringify!($variant)),)+
                    _ => None,
                }
            }
        }

        impl<'a> flatbuffers::Follow<'a> for $name {
            type Inner = Self;
            #[inline]
            unsafe fn follow(buf: &'a [u8], loc: usize) -> Self::Inner {
                Self(flatbuffers::read_scalar_at::<$repr>(buf, loc))
            }
        }

        impl flatbuffers::Push for $name {
            type Output = $name;
            #[inline]
            unsafe fn push(&self, dst: &mut [u8], _written_len: usize) {
                flatbuffers::emplace_scalar::<$repr>(dst, self.0);
            }
        }

        impl flatbuffers::Verifiable for $name {
            #[inline]
            fn run_verifier(
                v: &mut flatbuffers::Verifier,
                pos: usize,
            ) -> Result<(), flatbuffers::InvalidFlatbuffer> {
                <$repr as flatbuffers::Verifiable>::run_verifier(v, pos)
            }
        }
    };
}

pub mod header;
pub mod recipients;
