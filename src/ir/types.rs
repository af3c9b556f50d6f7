use core::fmt;
use cranelift_entity::{entity_impl, PrimaryMap};
use hashbrown::HashMap;

/// An interned handle to a type in a [`TypeStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Type(u32);
entity_impl!(Type);

/// The shape of a type. Interned and deduplicated, so two structurally
/// equal types always compare equal by handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeData {
    Void,
    /// An integer of the given bit width (1, 8, 16, 32, 64 or 128).
    Int(u16),
    /// 32-bit IEEE-754.
    Float,
    /// 64-bit IEEE-754.
    Double,
    Pointer(Type),
    Array(Type, u64),
    Function { params: Box<[Type]>, ret: Type },
}

/// The type universe of one IR module.
///
/// Common scalar types are created up front so they can be handed out
/// without interning.
#[derive(Debug)]
pub struct TypeStore {
    types: PrimaryMap<Type, TypeData>,
    interned: HashMap<TypeData, Type>,
    void: Type,
    int1: Type,
    int8: Type,
    int16: Type,
    int32: Type,
    int64: Type,
    int128: Type,
    float: Type,
    double: Type,
}

impl TypeStore {
    pub fn new() -> Self {
        let mut types = PrimaryMap::new();
        let mut interned = HashMap::new();
        let mut mk = |data: TypeData| {
            let ty = types.push(data.clone());
            interned.insert(data, ty);
            ty
        };
        let void = mk(TypeData::Void);
        let int1 = mk(TypeData::Int(1));
        let int8 = mk(TypeData::Int(8));
        let int16 = mk(TypeData::Int(16));
        let int32 = mk(TypeData::Int(32));
        let int64 = mk(TypeData::Int(64));
        let int128 = mk(TypeData::Int(128));
        let float = mk(TypeData::Float);
        let double = mk(TypeData::Double);
        Self {
            types,
            interned,
            void,
            int1,
            int8,
            int16,
            int32,
            int64,
            int128,
            float,
            double,
        }
    }

    pub fn intern(&mut self, data: TypeData) -> Type {
        if let Some(ty) = self.interned.get(&data) {
            return *ty;
        }
        let ty = self.types.push(data.clone());
        self.interned.insert(data, ty);
        ty
    }

    pub fn data(&self, ty: Type) -> &TypeData {
        &self.types[ty]
    }

    pub fn void(&self) -> Type {
        self.void
    }
    pub fn int1(&self) -> Type {
        self.int1
    }
    pub fn int8(&self) -> Type {
        self.int8
    }
    pub fn int16(&self) -> Type {
        self.int16
    }
    pub fn int32(&self) -> Type {
        self.int32
    }
    pub fn int64(&self) -> Type {
        self.int64
    }
    pub fn int128(&self) -> Type {
        self.int128
    }
    pub fn float(&self) -> Type {
        self.float
    }
    pub fn double(&self) -> Type {
        self.double
    }

    pub fn pointer_to(&mut self, pointee: Type) -> Type {
        self.intern(TypeData::Pointer(pointee))
    }

    pub fn array_of(&mut self, element: Type, len: u64) -> Type {
        self.intern(TypeData::Array(element, len))
    }

    pub fn function(&mut self, params: &[Type], ret: Type) -> Type {
        self.intern(TypeData::Function {
            params: params.into(),
            ret,
        })
    }

    pub fn is_void(&self, ty: Type) -> bool {
        matches!(self.types[ty], TypeData::Void)
    }

    /// The pointee of a pointer type, or `None` for non-pointers.
    pub fn pointee(&self, ty: Type) -> Option<Type> {
        match self.types[ty] {
            TypeData::Pointer(inner) => Some(inner),
            _ => None,
        }
    }

    /// Element type and length of an array type, or `None` for non-arrays.
    pub fn array_info(&self, ty: Type) -> Option<(Type, u64)> {
        match self.types[ty] {
            TypeData::Array(elem, len) => Some((elem, len)),
            _ => None,
        }
    }

    /// Renders a type the way LLVM would spell it, e.g. `[65536 x i8]` or
    /// `void (i32)*`.
    pub fn display(&self, ty: Type) -> TypeDisplay<'_> {
        TypeDisplay { store: self, ty }
    }
}

impl Default for TypeStore {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TypeDisplay<'a> {
    store: &'a TypeStore,
    ty: Type,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.store.data(self.ty) {
            TypeData::Void => write!(f, "void"),
            TypeData::Int(bits) => write!(f, "i{bits}"),
            TypeData::Float => write!(f, "float"),
            TypeData::Double => write!(f, "double"),
            TypeData::Pointer(inner) => write!(f, "{}*", self.store.display(*inner)),
            TypeData::Array(elem, len) => write!(f, "[{len} x {}]", self.store.display(*elem)),
            TypeData::Function { params, ret } => {
                write!(f, "{} (", self.store.display(*ret))?;
                for (i, p) in params.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", self.store.display(*p))?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_deduplicates() {
        let mut store = TypeStore::new();
        let a = store.array_of(store.int8(), 4);
        let b = store.array_of(store.int8(), 4);
        assert_eq!(a, b);
        let p = store.pointer_to(a);
        assert_eq!(store.pointee(p), Some(a));
    }

    #[test]
    fn display_matches_llvm_spelling() {
        let mut store = TypeStore::new();
        let arr = store.array_of(store.int8(), 65536);
        assert_eq!(store.display(arr).to_string(), "[65536 x i8]");
        let f = store.function(&[store.int32()], store.void());
        let fp = store.pointer_to(f);
        assert_eq!(store.display(fp).to_string(), "void (i32)*");
    }
}
