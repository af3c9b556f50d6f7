use crate::errors::Error;
use crate::ir::{Constant, Signature, Type, TypeData, TypeStore};

/// Maps a Wasm value type to its IR counterpart.
pub(crate) fn value_type(types: &TypeStore, ty: wasmparser::ValType) -> crate::Result<Type> {
    use wasmparser::ValType;
    match ty {
        ValType::I32 => Ok(types.int32()),
        ValType::I64 => Ok(types.int64()),
        ValType::F32 => Ok(types.float()),
        ValType::F64 => Ok(types.double()),
        ValType::V128 => Ok(types.int128()),
        ValType::Ref(_) => Err(Error::UnsupportedType(format!("{ty}"))),
    }
}

/// The zero value of an IR type. Float zeros are positive zero; the void
/// type has no zero.
pub(crate) fn zero_value(types: &TypeStore, ty: Type) -> crate::Result<Constant> {
    match *types.data(ty) {
        TypeData::Int(_) => Ok(Constant::Int { ty, bits: 0 }),
        TypeData::Float => Ok(Constant::Float { ty, bits: 0 }),
        TypeData::Double => Ok(Constant::Double { ty, bits: 0 }),
        TypeData::Pointer(_) => Ok(Constant::Null { ty }),
        _ => Err(Error::UnsupportedType(format!("{}", types.display(ty)))),
    }
}

/// Converts a Wasm function type to an IR signature. Zero results map to
/// void; more than one result is unsupported.
pub(crate) fn func_signature(
    types: &TypeStore,
    func_type: &wasmparser::FuncType,
) -> crate::Result<Signature> {
    let mut params = Vec::with_capacity(func_type.params().len());
    for ty in func_type.params() {
        params.push(value_type(types, *ty)?);
    }

    let results = func_type.results();
    let ret = match results.len() {
        0 => types.void(),
        1 => value_type(types, results[0])?,
        n => return Err(Error::MultiValueUnsupported(n)),
    };

    Ok(Signature { params, ret })
}
