use crate::errors::Error;
use crate::ir::{Constant, TypeStore};
use crate::parse::{ConstExpr, ConstOp};

/// Reduces single-operator initializer expressions to IR constants.
#[derive(Debug, Default)]
pub struct ConstExprEvaluator {}

impl ConstExprEvaluator {
    /// Evaluates an initializer expression.
    ///
    /// Returns `Ok(None)` for opaque single-operator expressions (e.g.
    /// `ref.null`) that have no scalar constant counterpart; callers in a
    /// defaultable position substitute aggregate zero. `global.get` is
    /// rejected rather than resolved transitively.
    pub fn eval(&mut self, types: &TypeStore, expr: &ConstExpr) -> crate::Result<Option<Constant>> {
        if expr.len() != 1 {
            return Err(Error::MalformedInitExpr(expr.len()));
        }
        let Some(op) = expr.ops().next() else {
            return Err(Error::MalformedInitExpr(0));
        };
        match op {
            ConstOp::I32Const(value) => Ok(Some(Constant::Int {
                ty: types.int32(),
                bits: u64::from(value as u32),
            })),
            ConstOp::I64Const(value) => Ok(Some(Constant::Int {
                ty: types.int64(),
                bits: value as u64,
            })),
            ConstOp::F32Const(bits) => Ok(Some(Constant::Float {
                ty: types.float(),
                bits,
            })),
            ConstOp::F64Const(bits) => Ok(Some(Constant::Double {
                ty: types.double(),
                bits,
            })),
            ConstOp::GlobalGet(index) => Err(Error::UnsupportedInitExpr(format!(
                "global.get {}",
                index.as_u32()
            ))),
            ConstOp::V128Const(_) => Err(Error::UnsupportedInitExpr("v128.const".into())),
            ConstOp::RefNull | ConstOp::RefFunc(_) => Ok(None),
            op => Err(Error::UnsupportedInitExpr(format!("{op:?}"))),
        }
    }

    /// Evaluates an offset expression to an unsigned integer.
    pub fn eval_offset(&mut self, types: &TypeStore, expr: &ConstExpr) -> crate::Result<u64> {
        self.eval(types, expr)?
            .and_then(|constant| constant.as_int())
            .ok_or_else(|| Error::UnsupportedInitExpr("expected an integer constant".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::ModuleParser;

    fn global_initializer(wat: &str) -> ConstExpr {
        let bytes = wat::parse_str(wat).unwrap();
        let mut validator = wasmparser::Validator::new();
        let parsed = ModuleParser::new(&mut validator).parse(&bytes).unwrap();
        parsed
            .global_initializers
            .values()
            .next()
            .unwrap()
            .clone()
    }

    #[test]
    fn float_constants_are_bit_exact() {
        let types = TypeStore::new();
        let mut eval = ConstExprEvaluator::default();

        let expr = global_initializer("(module (global f32 (f32.const 1.5)))");
        let constant = eval.eval(&types, &expr).unwrap().unwrap();
        match constant {
            Constant::Float { bits, .. } => assert_eq!(f32::from_bits(bits), 1.5),
            other => panic!("expected a float constant, got {other:?}"),
        }
    }

    #[test]
    fn offsets_reduce_to_unsigned_integers() {
        let types = TypeStore::new();
        let mut eval = ConstExprEvaluator::default();

        let expr = global_initializer("(module (global i32 (i32.const 16)))");
        assert_eq!(eval.eval_offset(&types, &expr).unwrap(), 16);

        let expr = global_initializer("(module (global i32 (i32.const -1)))");
        assert_eq!(eval.eval_offset(&types, &expr).unwrap(), u64::from(u32::MAX));
    }

    #[test]
    fn opaque_initializers_have_no_constant() {
        let types = TypeStore::new();
        let mut eval = ConstExprEvaluator::default();

        let expr = global_initializer("(module (global funcref (ref.null func)))");
        assert!(eval.eval(&types, &expr).unwrap().is_none());
    }
}
