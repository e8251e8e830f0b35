//! Opcode handler implementations grouped by category.
//!
//! Handlers receive the VM and the decoded instruction and return a
//! [`ControlFlow`] telling the dispatch loop what to do next. The value
//! operations themselves live in the free functions below so that the
//! interpreter handlers and the template executor share one definition
//! of every arithmetic, comparison, and container primitive.

pub mod arithmetic;
pub mod calls;
pub mod comparison;
pub mod containers;
pub mod control;
pub mod load_store;

pub use super::dispatch::ControlFlow;

use molten_core::intern::{intern_owned, interned_by_ptr, interned_len_by_ptr};
use molten_core::{InternedString, Value};
use molten_runtime::{type_id_of, ListObject, TypeId};

use crate::error::{RuntimeError, VmResult};

// ============================================================================
// Type inspection
// ============================================================================

/// Resolved type name for diagnostics, looking through heap headers.
///
/// `Value::type_name` reports `"object"` for anything heap-allocated; this
/// reads the object header to recover the concrete type instead.
pub(crate) fn dynamic_type_name(v: Value) -> &'static str {
    if let Some(ptr) = v.as_object_ptr() {
        // Safety: the pointer came from a live heap value, so the header
        // in front of it is valid.
        unsafe { type_id_of(ptr) }.name()
    } else {
        v.type_name()
    }
}

/// Interned payload of a string value, if `v` is a string.
pub(crate) fn string_content(v: Value) -> Option<InternedString> {
    v.as_string_ptr().and_then(interned_by_ptr)
}

// ============================================================================
// Arithmetic
// ============================================================================

/// Addition: integer with overflow widening to float, float, and string
/// concatenation.
pub(crate) fn value_add(a: Value, b: Value) -> VmResult<Value> {
    if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
        return Ok(match x.checked_add(y).and_then(Value::int) {
            Some(v) => v,
            None => Value::float(x as f64 + y as f64),
        });
    }
    if let (Some(x), Some(y)) = (a.as_float_coerce(), b.as_float_coerce()) {
        return Ok(Value::float(x + y));
    }
    if let (Some(x), Some(y)) = (string_content(a), string_content(b)) {
        let mut joined = String::with_capacity(x.len() + y.len());
        joined.push_str(x.as_str());
        joined.push_str(y.as_str());
        let interned = intern_owned(joined);
        return Ok(Value::string(&interned));
    }
    Err(RuntimeError::unsupported_operand(
        "+",
        dynamic_type_name(a),
        dynamic_type_name(b),
    ))
}

pub(crate) fn value_sub(a: Value, b: Value) -> VmResult<Value> {
    if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
        return Ok(match x.checked_sub(y).and_then(Value::int) {
            Some(v) => v,
            None => Value::float(x as f64 - y as f64),
        });
    }
    if let (Some(x), Some(y)) = (a.as_float_coerce(), b.as_float_coerce()) {
        return Ok(Value::float(x - y));
    }
    Err(RuntimeError::unsupported_operand(
        "-",
        dynamic_type_name(a),
        dynamic_type_name(b),
    ))
}

pub(crate) fn value_mul(a: Value, b: Value) -> VmResult<Value> {
    if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
        return Ok(match x.checked_mul(y).and_then(Value::int) {
            Some(v) => v,
            None => Value::float(x as f64 * y as f64),
        });
    }
    if let (Some(x), Some(y)) = (a.as_float_coerce(), b.as_float_coerce()) {
        return Ok(Value::float(x * y));
    }
    Err(RuntimeError::unsupported_operand(
        "*",
        dynamic_type_name(a),
        dynamic_type_name(b),
    ))
}

/// Floor division. Integer quotients round toward negative infinity, so
/// `-7 // 2 == -4`, matching the guest language rather than Rust's
/// truncating `/`.
pub(crate) fn value_floor_div(a: Value, b: Value) -> VmResult<Value> {
    if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
        if y == 0 {
            return Err(RuntimeError::zero_division());
        }
        let q = x / y;
        let r = x % y;
        let q = if r != 0 && ((r < 0) != (y < 0)) { q - 1 } else { q };
        return Ok(match Value::int(q) {
            Some(v) => v,
            None => Value::float(q as f64),
        });
    }
    if let (Some(x), Some(y)) = (a.as_float_coerce(), b.as_float_coerce()) {
        if y == 0.0 {
            return Err(RuntimeError::zero_division());
        }
        return Ok(Value::float((x / y).floor()));
    }
    Err(RuntimeError::unsupported_operand(
        "//",
        dynamic_type_name(a),
        dynamic_type_name(b),
    ))
}

/// Modulo. The result takes the sign of the divisor, so `-7 % 3 == 2`.
pub(crate) fn value_mod(a: Value, b: Value) -> VmResult<Value> {
    if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
        if y == 0 {
            return Err(RuntimeError::zero_division());
        }
        let r = x % y;
        let r = if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r };
        return Ok(match Value::int(r) {
            Some(v) => v,
            None => Value::float(r as f64),
        });
    }
    if let (Some(x), Some(y)) = (a.as_float_coerce(), b.as_float_coerce()) {
        if y == 0.0 {
            return Err(RuntimeError::zero_division());
        }
        let r = x % y;
        let r = if r != 0.0 && ((r < 0.0) != (y < 0.0)) { r + y } else { r };
        return Ok(Value::float(r));
    }
    Err(RuntimeError::unsupported_operand(
        "%",
        dynamic_type_name(a),
        dynamic_type_name(b),
    ))
}

pub(crate) fn value_neg(v: Value) -> VmResult<Value> {
    if let Some(x) = v.as_int() {
        return Ok(match x.checked_neg().and_then(Value::int) {
            Some(n) => n,
            None => Value::float(-(x as f64)),
        });
    }
    if let Some(x) = v.as_float() {
        return Ok(Value::float(-x));
    }
    Err(RuntimeError::type_error(format!(
        "bad operand type for unary -: '{}'",
        dynamic_type_name(v)
    )))
}

// ============================================================================
// Ordering comparisons
// ============================================================================

pub(crate) fn value_lt(a: Value, b: Value) -> VmResult<Value> {
    if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
        return Ok(Value::bool(x < y));
    }
    if let (Some(x), Some(y)) = (a.as_float_coerce(), b.as_float_coerce()) {
        return Ok(Value::bool(x < y));
    }
    if let (Some(x), Some(y)) = (string_content(a), string_content(b)) {
        return Ok(Value::bool(x.as_str() < y.as_str()));
    }
    Err(RuntimeError::unsupported_operand(
        "<",
        dynamic_type_name(a),
        dynamic_type_name(b),
    ))
}

pub(crate) fn value_le(a: Value, b: Value) -> VmResult<Value> {
    if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
        return Ok(Value::bool(x <= y));
    }
    if let (Some(x), Some(y)) = (a.as_float_coerce(), b.as_float_coerce()) {
        return Ok(Value::bool(x <= y));
    }
    if let (Some(x), Some(y)) = (string_content(a), string_content(b)) {
        return Ok(Value::bool(x.as_str() <= y.as_str()));
    }
    Err(RuntimeError::unsupported_operand(
        "<=",
        dynamic_type_name(a),
        dynamic_type_name(b),
    ))
}

pub(crate) fn value_gt(a: Value, b: Value) -> VmResult<Value> {
    if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
        return Ok(Value::bool(x > y));
    }
    if let (Some(x), Some(y)) = (a.as_float_coerce(), b.as_float_coerce()) {
        return Ok(Value::bool(x > y));
    }
    if let (Some(x), Some(y)) = (string_content(a), string_content(b)) {
        return Ok(Value::bool(x.as_str() > y.as_str()));
    }
    Err(RuntimeError::unsupported_operand(
        ">",
        dynamic_type_name(a),
        dynamic_type_name(b),
    ))
}

pub(crate) fn value_ge(a: Value, b: Value) -> VmResult<Value> {
    if let (Some(x), Some(y)) = (a.as_int(), b.as_int()) {
        return Ok(Value::bool(x >= y));
    }
    if let (Some(x), Some(y)) = (a.as_float_coerce(), b.as_float_coerce()) {
        return Ok(Value::bool(x >= y));
    }
    if let (Some(x), Some(y)) = (string_content(a), string_content(b)) {
        return Ok(Value::bool(x.as_str() >= y.as_str()));
    }
    Err(RuntimeError::unsupported_operand(
        ">=",
        dynamic_type_name(a),
        dynamic_type_name(b),
    ))
}

// ============================================================================
// Containers
// ============================================================================

/// Length of a list or string.
pub(crate) fn value_len(v: Value) -> VmResult<Value> {
    if let Some(ptr) = v.as_object_ptr() {
        // Safety: the pointer came from a live heap value, so the header
        // in front of it is valid.
        let type_id = unsafe { type_id_of(ptr) };
        if type_id == TypeId::LIST {
            // Safety: the type id was just checked.
            let list = unsafe { &*(ptr as *const ListObject) };
            return Ok(Value::int_unchecked(list.len() as i64));
        }
        return Err(RuntimeError::type_error(format!(
            "object of type '{}' has no len()",
            type_id.name()
        )));
    }
    if let Some(ptr) = v.as_string_ptr() {
        if let Some(len) = interned_len_by_ptr(ptr) {
            return Ok(Value::int_unchecked(len as i64));
        }
    }
    Err(RuntimeError::type_error(format!(
        "object of type '{}' has no len()",
        v.type_name()
    )))
}

/// Appends `item` to a list value in place.
pub(crate) fn list_append_value(list: Value, item: Value) -> VmResult<()> {
    if let Some(ptr) = list.as_object_ptr() {
        // Safety: the pointer came from a live heap value, so the header
        // in front of it is valid.
        if unsafe { type_id_of(ptr) } == TypeId::LIST {
            // Safety: the type id was just checked, and the VM is single
            // threaded per heap, so the mutable access is exclusive.
            let list = unsafe { &mut *(ptr as *mut ListObject) };
            list.push(item);
            return Ok(());
        }
    }
    Err(RuntimeError::type_error(format!(
        "'{}' object has no attribute 'append'",
        dynamic_type_name(list)
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use molten_core::intern::intern;
    use molten_core::value::{SMALL_INT_MAX, SMALL_INT_MIN};
    use molten_runtime::Heap;

    fn int(i: i64) -> Value {
        Value::int(i).expect("test constant in range")
    }

    #[test]
    fn test_add_ints() {
        let v = value_add(int(2), int(3)).unwrap();
        assert_eq!(v.as_int(), Some(5));
    }

    #[test]
    fn test_add_overflow_widens_to_float() {
        let v = value_add(int(SMALL_INT_MAX), int(1)).unwrap();
        assert!(v.is_float());
        assert_eq!(v.as_float(), Some((SMALL_INT_MAX + 1) as f64));
    }

    #[test]
    fn test_neg_at_range_boundary_widens() {
        let v = value_neg(int(SMALL_INT_MIN)).unwrap();
        assert!(v.is_float());
        assert_eq!(v.as_float(), Some(-(SMALL_INT_MIN as f64)));
    }

    #[test]
    fn test_mixed_int_float() {
        let v = value_add(int(1), Value::float(2.5)).unwrap();
        assert_eq!(v.as_float(), Some(3.5));
        let v = value_mul(Value::float(0.5), int(6)).unwrap();
        assert_eq!(v.as_float(), Some(3.0));
    }

    #[test]
    fn test_floor_div_rounds_toward_negative_infinity() {
        let cases = [(7, 2, 3), (-7, 2, -4), (7, -2, -4), (-7, -2, 3)];
        for (x, y, want) in cases {
            let v = value_floor_div(int(x), int(y)).unwrap();
            assert_eq!(v.as_int(), Some(want), "{} // {}", x, y);
        }
        let v = value_floor_div(Value::float(-7.0), int(2)).unwrap();
        assert_eq!(v.as_float(), Some(-4.0));
    }

    #[test]
    fn test_mod_takes_sign_of_divisor() {
        let cases = [(7, 3, 1), (-7, 3, 2), (7, -3, -2), (-7, -3, -1)];
        for (x, y, want) in cases {
            let v = value_mod(int(x), int(y)).unwrap();
            assert_eq!(v.as_int(), Some(want), "{} % {}", x, y);
        }
        let v = value_mod(Value::float(-7.5), Value::float(3.0)).unwrap();
        assert_eq!(v.as_float(), Some(1.5));
    }

    #[test]
    fn test_division_by_zero() {
        let err = value_floor_div(int(1), int(0)).unwrap_err();
        assert_eq!(err.to_string(), "ZeroDivisionError: division by zero");
        let err = value_mod(Value::float(1.0), Value::float(0.0)).unwrap_err();
        assert_eq!(err.to_string(), "ZeroDivisionError: division by zero");
    }

    #[test]
    fn test_string_concat() {
        let a = intern("race");
        let b = intern("car");
        let v = value_add(Value::string(&a), Value::string(&b)).unwrap();
        let joined = string_content(v).unwrap();
        assert_eq!(joined.as_str(), "racecar");
    }

    #[test]
    fn test_string_ordering() {
        let a = intern("apple");
        let b = intern("banana");
        let v = value_lt(Value::string(&a), Value::string(&b)).unwrap();
        assert_eq!(v.as_bool(), Some(true));
        let v = value_ge(Value::string(&a), Value::string(&b)).unwrap();
        assert_eq!(v.as_bool(), Some(false));
    }

    #[test]
    fn test_bool_arithmetic_is_rejected() {
        let err = value_add(Value::bool(true), int(1)).unwrap_err();
        assert!(err
            .to_string()
            .contains("unsupported operand type(s) for +: 'bool' and 'int'"));
    }

    #[test]
    fn test_neg_type_error() {
        let err = value_neg(Value::bool(false)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: bad operand type for unary -: 'bool'"
        );
    }

    #[test]
    fn test_len_of_list_and_string() {
        let mut heap = Heap::new();
        let list = heap.alloc_list_value(ListObject::from_slice(&[int(1), int(2), int(3)]));
        assert_eq!(value_len(list).unwrap().as_int(), Some(3));

        let s = intern("hey");
        assert_eq!(value_len(Value::string(&s)).unwrap().as_int(), Some(3));

        let err = value_len(int(9)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: object of type 'int' has no len()"
        );
    }

    #[test]
    fn test_list_append() {
        let mut heap = Heap::new();
        let list = heap.alloc_list_value(ListObject::new());
        list_append_value(list, int(7)).unwrap();
        list_append_value(list, Value::none()).unwrap();
        assert_eq!(value_len(list).unwrap().as_int(), Some(2));

        let err = list_append_value(int(3), int(4)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: 'int' object has no attribute 'append'"
        );
    }
}
