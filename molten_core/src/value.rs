//! NaN-boxed guest value representation.
//!
//! Every guest value fits in a single 64-bit word. Floats use their native
//! IEEE 754 encoding; everything else hides in the quiet-NaN space, where
//! bits 48-50 carry a type tag and bits 0-47 carry the payload.
//!
//! | Tag  | Type        | Payload                        |
//! |------|-------------|--------------------------------|
//! | 0x0  | None        | unused                         |
//! | 0x1  | Bool        | 0 = false, 1 = true            |
//! | 0x2  | Int         | 48-bit signed integer          |
//! | 0x3  | Object      | 48-bit heap pointer            |
//! | 0x4  | String      | 48-bit interned data pointer   |
//!
//! Values are `Copy` and carry no lifetime. Object payloads are only
//! dereferenced while the owning heap is alive; string payloads resolve
//! through the interner, which never frees its entries.

use crate::intern::InternedString;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Quiet-NaN base pattern. 0x7FF8 rather than 0x7FFC so bits 48-50 stay
/// free for the tag.
const QNAN: u64 = 0x7FF8_0000_0000_0000;

/// Tag field, bits 48-50.
const TAG_SHIFT: u64 = 48;
const TAG_MASK: u64 = 0x0007_0000_0000_0000;

/// Payload field, bits 0-47.
const PAYLOAD_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

const TAG_NONE: u64 = 0;
const TAG_BOOL: u64 = 1;
const TAG_INT: u64 = 2;
const TAG_OBJECT: u64 = 3;
const TAG_STRING: u64 = 4;

/// Largest integer an immediate value can hold (47-bit signed).
pub const SMALL_INT_MAX: i64 = (1_i64 << 47) - 1;
/// Smallest integer an immediate value can hold.
pub const SMALL_INT_MIN: i64 = -(1_i64 << 47);

/// A guest value packed into one 64-bit word.
///
/// Exactly 8 bytes. Represents none, booleans, 48-bit integers, doubles,
/// interned strings, and heap object references.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct Value {
    bits: u64,
}

impl Value {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// The none value.
    #[inline]
    #[must_use]
    pub const fn none() -> Self {
        Self {
            bits: QNAN | (TAG_NONE << TAG_SHIFT),
        }
    }

    /// A boolean value.
    #[inline]
    #[must_use]
    pub const fn bool(b: bool) -> Self {
        Self {
            bits: QNAN | (TAG_BOOL << TAG_SHIFT) | (b as u64),
        }
    }

    /// An integer value, if it fits the 48-bit immediate range.
    #[inline]
    #[must_use]
    pub const fn int(i: i64) -> Option<Self> {
        if i >= SMALL_INT_MIN && i <= SMALL_INT_MAX {
            Some(Self::int_unchecked(i))
        } else {
            None
        }
    }

    /// An integer value without the range check. Out-of-range input is
    /// silently truncated to 48 bits; callers must check first.
    #[inline]
    #[must_use]
    pub const fn int_unchecked(i: i64) -> Self {
        let payload = (i as u64) & PAYLOAD_MASK;
        Self {
            bits: QNAN | (TAG_INT << TAG_SHIFT) | payload,
        }
    }

    /// A float value.
    ///
    /// Input NaNs whose bit pattern would alias the tagged space are
    /// canonicalized to a NaN outside it, so every float stays a float.
    #[inline]
    #[must_use]
    pub fn float(f: f64) -> Self {
        let bits = f.to_bits();
        if bits & QNAN == QNAN {
            Self {
                bits: 0x7FF0_0000_0000_0001,
            }
        } else {
            Self { bits }
        }
    }

    /// A heap object reference.
    ///
    /// The pointer must stay valid for as long as this value (or any copy
    /// of it) can be dereferenced; the heap that allocated it guarantees
    /// that for the VM's lifetime.
    #[inline]
    #[must_use]
    pub fn object_ptr(ptr: *const ()) -> Self {
        let ptr_bits = ptr as usize as u64;
        debug_assert!(
            ptr_bits & !PAYLOAD_MASK == 0,
            "pointer exceeds 48-bit payload"
        );
        Self {
            bits: QNAN | (TAG_OBJECT << TAG_SHIFT) | (ptr_bits & PAYLOAD_MASK),
        }
    }

    /// An interned string value.
    ///
    /// Stores the interner-owned data pointer. The refcount is bumped and
    /// the clone forgotten, so the payload stays resolvable even if the
    /// interner later drops its entry.
    #[inline]
    #[must_use]
    pub fn string(s: &InternedString) -> Self {
        let arc = s.get_arc();
        let ptr = arc.as_ptr() as usize as u64;
        std::mem::forget(arc);
        debug_assert!(ptr & !PAYLOAD_MASK == 0, "pointer exceeds 48-bit payload");
        Self {
            bits: QNAN | (TAG_STRING << TAG_SHIFT) | (ptr & PAYLOAD_MASK),
        }
    }

    // =========================================================================
    // Type checks
    // =========================================================================

    /// True for every non-float value.
    #[inline]
    #[must_use]
    pub const fn is_tagged(&self) -> bool {
        (self.bits & QNAN) == QNAN
    }

    /// True for floats.
    #[inline]
    #[must_use]
    pub const fn is_float(&self) -> bool {
        (self.bits & QNAN) != QNAN
    }

    /// True for none.
    #[inline]
    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.is_tagged() && self.tag() == TAG_NONE
    }

    /// True for booleans.
    #[inline]
    #[must_use]
    pub const fn is_bool(&self) -> bool {
        self.is_tagged() && self.tag() == TAG_BOOL
    }

    /// True for immediate integers.
    #[inline]
    #[must_use]
    pub const fn is_int(&self) -> bool {
        self.is_tagged() && self.tag() == TAG_INT
    }

    /// True for heap object references.
    #[inline]
    #[must_use]
    pub const fn is_object(&self) -> bool {
        self.is_tagged() && self.tag() == TAG_OBJECT
    }

    /// True for interned strings.
    #[inline]
    #[must_use]
    pub const fn is_string(&self) -> bool {
        self.is_tagged() && self.tag() == TAG_STRING
    }

    #[inline]
    const fn tag(&self) -> u64 {
        (self.bits & TAG_MASK) >> TAG_SHIFT
    }

    #[inline]
    const fn payload(&self) -> u64 {
        self.bits & PAYLOAD_MASK
    }

    // =========================================================================
    // Extraction
    // =========================================================================

    /// Extract a boolean.
    #[inline]
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        if self.is_bool() {
            Some(self.payload() != 0)
        } else {
            None
        }
    }

    /// Extract an integer, sign-extending the 48-bit payload.
    #[inline]
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        if self.is_int() {
            let payload = self.payload();
            if payload & (1 << 47) != 0 {
                Some((payload | !PAYLOAD_MASK) as i64)
            } else {
                Some(payload as i64)
            }
        } else {
            None
        }
    }

    /// Extract a float.
    #[inline]
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if self.is_float() {
            Some(f64::from_bits(self.bits))
        } else {
            None
        }
    }

    /// Extract a float, widening an integer if needed.
    #[inline]
    #[must_use]
    pub fn as_float_coerce(&self) -> Option<f64> {
        if let Some(f) = self.as_float() {
            Some(f)
        } else {
            self.as_int().map(|i| i as f64)
        }
    }

    /// Extract a heap object pointer.
    #[inline]
    #[must_use]
    pub const fn as_object_ptr(&self) -> Option<*const ()> {
        if self.is_object() {
            Some(self.payload() as *const ())
        } else {
            None
        }
    }

    /// Extract the interned string data pointer.
    ///
    /// Resolve it to content through the interner's pointer index; the
    /// pointer itself is stable because interner entries are never freed
    /// while values reference them.
    #[inline]
    #[must_use]
    pub const fn as_string_ptr(&self) -> Option<*const u8> {
        if self.is_string() {
            Some(self.payload() as *const u8)
        } else {
            None
        }
    }

    // =========================================================================
    // Semantics
    // =========================================================================

    /// Guest truthiness: none, false, 0 and 0.0 are falsy; objects and
    /// strings are truthy here (container ops handle emptiness themselves).
    #[inline]
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        if let Some(b) = self.as_bool() {
            return b;
        }
        if let Some(f) = self.as_float_coerce() {
            return f != 0.0;
        }
        !self.is_none()
    }

    /// Guest-visible type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        if self.is_float() {
            return "float";
        }
        match self.tag() {
            TAG_NONE => "NoneType",
            TAG_BOOL => "bool",
            TAG_INT => "int",
            TAG_STRING => "str",
            TAG_OBJECT => "object",
            _ => "unknown",
        }
    }

    /// Raw bit pattern.
    #[inline]
    #[must_use]
    pub const fn to_bits(&self) -> u64 {
        self.bits
    }

    /// Rebuild a value from a raw bit pattern.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self { bits }
    }
}

/// A finite float with no fractional part, as the integer it denotes.
/// 48-bit value payloads are always exact in an f64 mantissa.
fn exact_int(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && (i64::MIN as f64..=i64::MAX as f64).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        // Float pairs first: NaN != NaN even with identical bits.
        if self.is_float() && other.is_float() {
            return f64::from_bits(self.bits) == f64::from_bits(other.bits);
        }

        if self.bits == other.bits {
            return true;
        }

        // Int/float pairs compare numerically, so 1 == 1.0.
        if self.is_float() || other.is_float() {
            if let (Some(a), Some(b)) = (self.as_float_coerce(), other.as_float_coerce()) {
                return a == b;
            }
        }

        false
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Numerically equal int and float must hash alike to match Eq.
        if let Some(i) = self.as_int() {
            i.hash(state);
        } else if let Some(i) = self.as_float().and_then(exact_int) {
            i.hash(state);
        } else {
            self.bits.hash(state);
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_object() || self.is_string() {
            write!(f, "Value({} {:#x})", self.type_name(), self.payload())
        } else if self.is_tagged() && self.tag() > TAG_STRING {
            write!(f, "Value({:#018x})", self.bits)
        } else {
            write!(f, "Value({self})")
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("None");
        }
        if let Some(b) = self.as_bool() {
            return f.write_str(if b { "True" } else { "False" });
        }
        if let Some(i) = self.as_int() {
            return write!(f, "{i}");
        }
        if let Some(fl) = self.as_float() {
            // Whole floats keep a trailing .0 like the guest expects.
            return if fl.fract() == 0.0 && fl.is_finite() {
                write!(f, "{}.0", fl as i64)
            } else {
                write!(f, "{fl}")
            };
        }
        // Reference kinds render as an address-stamped placeholder.
        write!(f, "<{} at {:#x}>", self.type_name(), self.payload())
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::none()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::bool(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::float(f)
    }
}

// Integer conversion is fallible: the immediate payload is 48 bits wide.
impl TryFrom<i64> for Value {
    type Error = crate::error::CoreError;

    fn try_from(i: i64) -> Result<Self, Self::Error> {
        Self::int(i).ok_or(crate::error::CoreError::IntOutOfRange { value: i })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::intern;

    #[test]
    fn value_is_one_word() {
        assert_eq!(std::mem::size_of::<Value>(), 8);
    }

    #[test]
    fn none_roundtrip() {
        let v = Value::none();
        assert!(v.is_none());
        assert!(v.is_tagged());
        assert!(!v.is_float());
        assert!(!v.is_truthy());
        assert_eq!(v.type_name(), "NoneType");
    }

    #[test]
    fn bool_roundtrip() {
        let t = Value::bool(true);
        let f = Value::bool(false);
        assert_eq!(t.as_bool(), Some(true));
        assert_eq!(f.as_bool(), Some(false));
        assert!(t.is_truthy());
        assert!(!f.is_truthy());
        assert_eq!(t.type_name(), "bool");
    }

    #[test]
    fn int_roundtrip() {
        for i in [0, 1, -1, 42, -42, 1_000_000, -1_000_000] {
            let v = Value::int(i).unwrap();
            assert!(v.is_int());
            assert_eq!(v.as_int(), Some(i));
        }
    }

    #[test]
    fn int_range_boundaries() {
        for i in [
            SMALL_INT_MIN,
            SMALL_INT_MIN + 1,
            -1,
            0,
            1,
            SMALL_INT_MAX - 1,
            SMALL_INT_MAX,
        ] {
            let v = Value::int(i).expect("in range");
            assert_eq!(v.as_int(), Some(i), "roundtrip failed for {i}");
        }
        assert!(Value::int(SMALL_INT_MAX + 1).is_none());
        assert!(Value::int(SMALL_INT_MIN - 1).is_none());
    }

    #[test]
    fn negative_int_sign_extension() {
        for i in [-1_i64, -2, -100, -65_536, SMALL_INT_MIN] {
            let v = Value::int(i).unwrap();
            assert_eq!(v.as_int(), Some(i), "sign extension failed for {i}");
        }
    }

    #[test]
    fn float_roundtrip() {
        for f in [0.0, -0.0, 3.25, -2.5, 1e300, f64::MIN_POSITIVE, f64::EPSILON] {
            let v = Value::float(f);
            assert!(v.is_float());
            assert_eq!(v.as_float(), Some(f));
        }
    }

    #[test]
    fn float_infinities() {
        assert_eq!(
            Value::float(f64::INFINITY).as_float(),
            Some(f64::INFINITY)
        );
        assert_eq!(
            Value::float(f64::NEG_INFINITY).as_float(),
            Some(f64::NEG_INFINITY)
        );
    }

    #[test]
    fn float_nan_stays_float() {
        let v = Value::float(f64::NAN);
        assert!(v.is_float());
        assert!(!v.is_int());
        assert!(v.as_float().unwrap().is_nan());
    }

    #[test]
    fn float_nan_never_aliases_tags() {
        // A NaN with all tag bits set would decode as a tagged value if
        // canonicalization were missing.
        let hostile = f64::from_bits(QNAN | TAG_MASK | 0xDEAD);
        let v = Value::float(hostile);
        assert!(v.is_float());
        assert!(v.as_float().unwrap().is_nan());
    }

    #[test]
    fn subnormal_float_roundtrip() {
        let sub = f64::MIN_POSITIVE / 2.0;
        assert!(sub.is_subnormal());
        assert_eq!(Value::float(sub).as_float(), Some(sub));
    }

    #[test]
    fn float_coercion() {
        assert_eq!(Value::int(42).unwrap().as_float_coerce(), Some(42.0));
        assert_eq!(Value::float(3.25).as_float_coerce(), Some(3.25));
        assert_eq!(Value::none().as_float_coerce(), None);
    }

    #[test]
    fn truthiness_table() {
        assert!(!Value::none().is_truthy());
        assert!(!Value::bool(false).is_truthy());
        assert!(!Value::int(0).unwrap().is_truthy());
        assert!(!Value::float(0.0).is_truthy());

        assert!(Value::bool(true).is_truthy());
        assert!(Value::int(-1).unwrap().is_truthy());
        assert!(Value::float(0.5).is_truthy());
        assert!(Value::float(f64::INFINITY).is_truthy());
    }

    #[test]
    fn equality_basics() {
        assert_eq!(Value::none(), Value::none());
        assert_eq!(Value::bool(true), Value::bool(true));
        assert_ne!(Value::bool(true), Value::bool(false));
        assert_eq!(Value::int(7).unwrap(), Value::int(7).unwrap());
        assert_ne!(Value::int(7).unwrap(), Value::int(8).unwrap());
    }

    #[test]
    fn equality_nan() {
        assert_ne!(Value::float(f64::NAN), Value::float(f64::NAN));
    }

    #[test]
    fn equality_mixed_numeric() {
        assert_eq!(Value::int(1).unwrap(), Value::float(1.0));
        assert_eq!(Value::float(0.0), Value::int(0).unwrap());
        assert_ne!(Value::int(1).unwrap(), Value::float(1.5));
    }

    #[test]
    fn hash_mixed_numeric_equivalence() {
        use std::collections::hash_map::DefaultHasher;

        let hash = |v: Value| {
            let mut h = DefaultHasher::new();
            v.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(Value::int(42).unwrap()), hash(Value::float(42.0)));
    }

    #[test]
    fn usable_as_map_key() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(Value::int(1).unwrap(), "one");
        assert_eq!(map.get(&Value::float(1.0)), Some(&"one"));
    }

    #[test]
    fn display_formatting() {
        assert_eq!(Value::none().to_string(), "None");
        assert_eq!(Value::bool(true).to_string(), "True");
        assert_eq!(Value::bool(false).to_string(), "False");
        assert_eq!(Value::int(-42).unwrap().to_string(), "-42");
        assert_eq!(Value::float(42.0).to_string(), "42.0");
        assert_eq!(Value::float(3.25).to_string(), "3.25");
    }

    #[test]
    fn debug_formatting() {
        assert!(format!("{:?}", Value::none()).contains("None"));
        assert!(format!("{:?}", Value::bool(true)).contains("True"));
        assert!(format!("{:?}", Value::int(42).unwrap()).contains("42"));
    }

    #[test]
    fn from_impls() {
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert!(Value::from(3.25_f64).is_float());
    }

    #[test]
    fn try_from_i64() {
        let ok: Result<Value, _> = 42_i64.try_into();
        assert_eq!(ok.unwrap().as_int(), Some(42));

        let too_big: Result<Value, _> = i64::MAX.try_into();
        assert!(too_big.is_err());
    }

    #[test]
    fn default_is_none() {
        assert!(Value::default().is_none());
    }

    #[test]
    fn bits_roundtrip() {
        for v in [
            Value::none(),
            Value::bool(true),
            Value::int(-42).unwrap(),
            Value::float(3.25),
        ] {
            assert_eq!(Value::from_bits(v.to_bits()).to_bits(), v.to_bits());
        }
    }

    #[test]
    fn extraction_rejects_wrong_type() {
        assert_eq!(Value::none().as_bool(), None);
        assert_eq!(Value::bool(true).as_int(), None);
        assert_eq!(Value::int(42).unwrap().as_float(), None);
        assert_eq!(Value::float(1.0).as_int(), None);
        assert_eq!(Value::int(1).unwrap().as_object_ptr(), None);
    }

    #[test]
    fn object_pointer_roundtrip() {
        let data = Box::new(99_u64);
        let ptr = Box::into_raw(data) as *const ();

        let v = Value::object_ptr(ptr);
        assert!(v.is_object());
        assert_eq!(v.as_object_ptr(), Some(ptr));
        assert_eq!(v.type_name(), "object");

        unsafe {
            drop(Box::from_raw(ptr as *mut u64));
        }
    }

    #[test]
    fn string_payload_matches_interned_data() {
        let s = intern("boxed_string");
        let v = Value::string(&s);
        assert!(v.is_string());
        assert_eq!(v.type_name(), "str");
        assert_eq!(v.as_string_ptr(), Some(s.as_str().as_ptr()));
    }

    #[test]
    fn same_interned_string_boxes_identically() {
        let a = Value::string(&intern("dup"));
        let b = Value::string(&intern("dup"));
        assert_eq!(a.to_bits(), b.to_bits());
        assert_eq!(a, b);
    }

    #[test]
    fn value_is_copy() {
        let a = Value::int(5).unwrap();
        let b = a;
        assert_eq!(a, b);
    }
}
