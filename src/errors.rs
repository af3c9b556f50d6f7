/// A WebAssembly lowering error.
#[derive(Debug, onlyerror::Error)]
pub enum Error {
    /// The input could not be read or parsed at all (e.g. malformed text
    /// format). The distinction from [`Error::InvalidWebAssembly`] is that
    /// no byte-level module was ever produced.
    #[error("failed to read module: {0}")]
    ReadFailed(String),
    /// The input WebAssembly module was rejected by validation.
    ///
    /// This should never happen for modules that already passed a
    /// validator.
    #[error("invalid WebAssembly input at {offset}: {message}")]
    InvalidWebAssembly {
        /// A string describing the validation error.
        message: String,
        /// The bytecode offset where the error occurred.
        offset: usize,
    },
    /// A WebAssembly feature outside the supported subset was used.
    #[error("feature used by the WebAssembly module is not supported: {0}")]
    Unsupported(String),
    /// A value type with no IR counterpart.
    #[error("cannot convert type: {0}")]
    UnsupportedType(String),
    /// An initializer expression that cannot be reduced to a constant.
    #[error("unsupported initializer expression: {0}")]
    UnsupportedInitExpr(String),
    /// An import of a kind the lowering does not model.
    #[error("unsupported import kind: {0}")]
    UnsupportedImportKind(String),
    /// An export of a kind the lowering does not model.
    #[error("unsupported export kind: {0}")]
    UnsupportedExternalKind(String),
    /// A table whose element type is not `funcref`.
    #[error("unsupported table element type: {0}")]
    UnsupportedTableType(String),
    /// An element segment using passive or expression-list encoding.
    #[error("unsupported element segment: {0}")]
    UnsupportedElemFlags(String),
    /// A signature or block type with more than one result.
    #[error("multi-value is not supported: {0} results")]
    MultiValueUnsupported(usize),
    /// An initializer expression that is not exactly one operator long.
    #[error("malformed initializer expression: {0} operators")]
    MalformedInitExpr(usize),
    /// An entity reference past the end of its index space.
    #[error("{kind} index out of range: {index}")]
    IndexOutOfRange {
        kind: &'static str,
        index: u32,
    },
    /// A data segment that does not fit inside its target memory.
    #[error("data segment out of bounds: offset {offset} + {len} bytes exceeds memory size {size}")]
    DataSegmentOutOfBounds { offset: u64, len: u64, size: u64 },
    /// The destination IR module already contains entities; lowering
    /// requires a fresh module.
    #[error("destination module is not empty")]
    ModuleNotEmpty,
    /// Overflow while computing a memory size in bytes.
    #[error("size overflow calculating memory size")]
    SizeOverflow,
}

impl From<wasmparser::BinaryReaderError> for Error {
    fn from(e: wasmparser::BinaryReaderError) -> Self {
        Self::InvalidWebAssembly {
            message: e.message().into(),
            offset: e.offset(),
        }
    }
}

impl From<wat::Error> for Error {
    fn from(e: wat::Error) -> Self {
        Self::ReadFailed(e.to_string())
    }
}

#[macro_export]
macro_rules! wasm_unsupported {
    ($($arg:tt)*) => { $crate::Error::Unsupported(format!($($arg)*)) }
}
