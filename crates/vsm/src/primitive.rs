//! Numeric dispatch for primitive operators
//!
//! Operators are not monomorphic: the machine selects an
//! implementation from a table keyed by the operator and the two
//! operands' representation kinds. Integer pairs stay integral, float
//! pairs stay floating, and mixed pairs promote to f64. Equality also
//! covers booleans and strings.
//!
//! Integer arithmetic wraps on overflow, matching two's-complement
//! machine behavior; integer division by zero is an error.

use crate::error::EvalError;
use skm_core::value::{PrimOp, Value, ValueKind};
use std::collections::HashMap;
use std::sync::OnceLock;

type BinFn = fn(&Value, &Value) -> Result<Value, EvalError>;

fn i64_pair(a: &Value, b: &Value) -> (i64, i64) {
    (a.as_i64().expect("i64 operand"), b.as_i64().expect("i64 operand"))
}

fn f64_pair(a: &Value, b: &Value) -> (f64, f64) {
    let to_f = |v: &Value| match v {
        Value::F64(x) => *x,
        Value::I64(n) => *n as f64,
        _ => unreachable!("numeric operand"),
    };
    (to_f(a), to_f(b))
}

fn add_i64(a: &Value, b: &Value) -> Result<Value, EvalError> {
    let (x, y) = i64_pair(a, b);
    Ok(Value::I64(x.wrapping_add(y)))
}

fn sub_i64(a: &Value, b: &Value) -> Result<Value, EvalError> {
    let (x, y) = i64_pair(a, b);
    Ok(Value::I64(x.wrapping_sub(y)))
}

fn mul_i64(a: &Value, b: &Value) -> Result<Value, EvalError> {
    let (x, y) = i64_pair(a, b);
    Ok(Value::I64(x.wrapping_mul(y)))
}

fn div_i64(a: &Value, b: &Value) -> Result<Value, EvalError> {
    let (x, y) = i64_pair(a, b);
    if y == 0 {
        return Err(EvalError::new("numeric::div_i64", "integer division by zero"));
    }
    Ok(Value::I64(x.wrapping_div(y)))
}

fn add_f64(a: &Value, b: &Value) -> Result<Value, EvalError> {
    let (x, y) = f64_pair(a, b);
    Ok(Value::F64(x + y))
}

fn sub_f64(a: &Value, b: &Value) -> Result<Value, EvalError> {
    let (x, y) = f64_pair(a, b);
    Ok(Value::F64(x - y))
}

fn mul_f64(a: &Value, b: &Value) -> Result<Value, EvalError> {
    let (x, y) = f64_pair(a, b);
    Ok(Value::F64(x * y))
}

// float division follows IEEE; no zero check
fn div_f64(a: &Value, b: &Value) -> Result<Value, EvalError> {
    let (x, y) = f64_pair(a, b);
    Ok(Value::F64(x / y))
}

fn cmp_i64(op: PrimOp, a: &Value, b: &Value) -> Result<Value, EvalError> {
    let (x, y) = i64_pair(a, b);
    Ok(Value::Bool(match op {
        PrimOp::CmpEq => x == y,
        PrimOp::CmpNe => x != y,
        PrimOp::CmpLt => x < y,
        PrimOp::CmpGt => x > y,
        _ => unreachable!("comparison op"),
    }))
}

fn cmp_f64(op: PrimOp, a: &Value, b: &Value) -> Result<Value, EvalError> {
    let (x, y) = f64_pair(a, b);
    Ok(Value::Bool(match op {
        PrimOp::CmpEq => x == y,
        PrimOp::CmpNe => x != y,
        PrimOp::CmpLt => x < y,
        PrimOp::CmpGt => x > y,
        _ => unreachable!("comparison op"),
    }))
}

macro_rules! cmp_fn {
    ($name:ident, $impl_fn:ident, $op:expr) => {
        fn $name(a: &Value, b: &Value) -> Result<Value, EvalError> {
            $impl_fn($op, a, b)
        }
    };
}

cmp_fn!(eq_i64, cmp_i64, PrimOp::CmpEq);
cmp_fn!(ne_i64, cmp_i64, PrimOp::CmpNe);
cmp_fn!(lt_i64, cmp_i64, PrimOp::CmpLt);
cmp_fn!(gt_i64, cmp_i64, PrimOp::CmpGt);
cmp_fn!(eq_f64, cmp_f64, PrimOp::CmpEq);
cmp_fn!(ne_f64, cmp_f64, PrimOp::CmpNe);
cmp_fn!(lt_f64, cmp_f64, PrimOp::CmpLt);
cmp_fn!(gt_f64, cmp_f64, PrimOp::CmpGt);

fn eq_bool(a: &Value, b: &Value) -> Result<Value, EvalError> {
    Ok(Value::Bool(a.as_bool() == b.as_bool()))
}

fn ne_bool(a: &Value, b: &Value) -> Result<Value, EvalError> {
    Ok(Value::Bool(a.as_bool() != b.as_bool()))
}

fn eq_str(a: &Value, b: &Value) -> Result<Value, EvalError> {
    Ok(Value::Bool(a.as_str() == b.as_str()))
}

fn ne_str(a: &Value, b: &Value) -> Result<Value, EvalError> {
    Ok(Value::Bool(a.as_str() != b.as_str()))
}

fn dispatch_table() -> &'static HashMap<(PrimOp, ValueKind, ValueKind), BinFn> {
    static TABLE: OnceLock<HashMap<(PrimOp, ValueKind, ValueKind), BinFn>> = OnceLock::new();
    TABLE.get_or_init(|| {
        use PrimOp::*;
        use ValueKind::*;
        let mut t: HashMap<(PrimOp, ValueKind, ValueKind), BinFn> = HashMap::new();

        t.insert((Add, I64, I64), add_i64);
        t.insert((Sub, I64, I64), sub_i64);
        t.insert((Mul, I64, I64), mul_i64);
        t.insert((Div, I64, I64), div_i64);
        t.insert((CmpEq, I64, I64), eq_i64);
        t.insert((CmpNe, I64, I64), ne_i64);
        t.insert((CmpLt, I64, I64), lt_i64);
        t.insert((CmpGt, I64, I64), gt_i64);

        // float and mixed pairs share the promoting implementations
        for pair in [(F64, F64), (I64, F64), (F64, I64)] {
            t.insert((Add, pair.0, pair.1), add_f64);
            t.insert((Sub, pair.0, pair.1), sub_f64);
            t.insert((Mul, pair.0, pair.1), mul_f64);
            t.insert((Div, pair.0, pair.1), div_f64);
            t.insert((CmpEq, pair.0, pair.1), eq_f64);
            t.insert((CmpNe, pair.0, pair.1), ne_f64);
            t.insert((CmpLt, pair.0, pair.1), lt_f64);
            t.insert((CmpGt, pair.0, pair.1), gt_f64);
        }

        t.insert((CmpEq, Bool, Bool), eq_bool);
        t.insert((CmpNe, Bool, Bool), ne_bool);
        t.insert((CmpEq, Str, Str), eq_str);
        t.insert((CmpNe, Str, Str), ne_str);

        t
    })
}

/// Apply `op` to two boxed operands through the dispatch table.
pub fn apply_prim(op: PrimOp, a: &Value, b: &Value) -> Result<Value, EvalError> {
    let key = (op, a.kind(), b.kind());
    let f = dispatch_table().get(&key).ok_or_else(|| {
        EvalError::new(
            "numeric::apply_prim",
            format!(
                "operator '{}' not defined for {} and {}",
                op.spelling(),
                a.type_name(),
                b.type_name()
            ),
        )
    })?;
    f(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(
            apply_prim(PrimOp::Mul, &Value::I64(13), &Value::I64(15)).unwrap(),
            Value::I64(195)
        );
        assert_eq!(
            apply_prim(PrimOp::Sub, &Value::I64(3), &Value::I64(10)).unwrap(),
            Value::I64(-7)
        );
    }

    #[test]
    fn test_integer_overflow_wraps() {
        assert_eq!(
            apply_prim(PrimOp::Add, &Value::I64(i64::MAX), &Value::I64(1)).unwrap(),
            Value::I64(i64::MIN)
        );
    }

    #[test]
    fn test_float_arithmetic() {
        assert_eq!(
            apply_prim(PrimOp::Mul, &Value::F64(3.14159265), &Value::F64(0.5)).unwrap(),
            Value::F64(1.570796325)
        );
    }

    #[test]
    fn test_mixed_operands_promote() {
        assert_eq!(
            apply_prim(PrimOp::Add, &Value::I64(1), &Value::F64(0.5)).unwrap(),
            Value::F64(1.5)
        );
        assert_eq!(
            apply_prim(PrimOp::CmpEq, &Value::F64(2.0), &Value::I64(2)).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_division_by_zero_is_error() {
        let err = apply_prim(PrimOp::Div, &Value::I64(1), &Value::I64(0)).unwrap_err();
        assert!(err.message.contains("division by zero"));
        // float division follows IEEE instead
        assert_eq!(
            apply_prim(PrimOp::Div, &Value::F64(1.0), &Value::F64(0.0)).unwrap(),
            Value::F64(f64::INFINITY)
        );
    }

    #[test]
    fn test_equality_on_bools_and_strings() {
        assert_eq!(
            apply_prim(PrimOp::CmpEq, &Value::Bool(true), &Value::Bool(true)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            apply_prim(
                PrimOp::CmpNe,
                &Value::Str("a".into()),
                &Value::Str("b".into())
            )
            .unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_undefined_combination_is_error() {
        let err = apply_prim(PrimOp::Add, &Value::Bool(true), &Value::I64(1)).unwrap_err();
        assert!(err.message.contains("not defined"));
    }
}
