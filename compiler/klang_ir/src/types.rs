//! Resolved types and compile-time constant values.
//!
//! These are the validator's view of the world: every expression it accepts
//! gets exactly one of these types, and compile-time evaluable expressions
//! fold to a [`Constant`].

use std::fmt;

/// A fully resolved primitive type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Primitive {
    Int32,
    Float32,
    Bool,
    Void,
}

impl Primitive {
    /// Size in bytes when stored in linear memory.
    ///
    /// Bool occupies a full i32 cell; void is never stored.
    pub const fn byte_size(self) -> u32 {
        4
    }

    /// The implicit value of a declaration without an initializer.
    pub fn zero(self) -> Option<Constant> {
        match self {
            Primitive::Int32 => Some(Constant::Int32(0)),
            Primitive::Float32 => Some(Constant::Float32(0.0)),
            Primitive::Bool => Some(Constant::Bool(false)),
            Primitive::Void => None,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Primitive::Int32 => "int",
            Primitive::Float32 => "float",
            Primitive::Bool => "bool",
            Primitive::Void => "void",
        };
        f.write_str(name)
    }
}

/// A resolved compile-time constant value.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Constant {
    Int32(i32),
    Float32(f32),
    Bool(bool),
}

impl Constant {
    pub fn ty(self) -> Primitive {
        match self {
            Constant::Int32(_) => Primitive::Int32,
            Constant::Float32(_) => Primitive::Float32,
            Constant::Bool(_) => Primitive::Bool,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int32(v) => write!(f, "{v}"),
            Constant::Float32(v) => write!(f, "{v}"),
            Constant::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// An array resolved to its element type, compile-time length, and byte
/// offset in linear memory.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ArrayType {
    pub elem: Primitive,
    pub length: u32,
    pub offset: u32,
}

impl ArrayType {
    pub const fn byte_size(&self) -> u32 {
        self.length * self.elem.byte_size()
    }
}

/// A function signature: ordered parameter types plus a return type.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FunctionType {
    pub params: Vec<Primitive>,
    pub ret: Primitive,
}

/// One field of a fixed-layout struct in the static data segment.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StructField {
    pub name: &'static str,
    pub ty: Primitive,
    pub offset: u32,
}

/// A fixed named-field record. Only used for the parameter-info structs
/// emitted into the static data segment; never expressible in source.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StructType {
    pub fields: Vec<StructField>,
}

impl StructType {
    pub fn byte_size(&self) -> u32 {
        self.fields
            .last()
            .map_or(0, |f| f.offset + f.ty.byte_size())
    }
}

/// The full resolved type of an expression or declaration.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Type {
    Primitive(Primitive),
    /// Transient carrier for string literals. A string can be passed to a
    /// logging builtin but never stored in a variable.
    String,
    Array(ArrayType),
    Struct(StructType),
    Function(FunctionType),
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{p}"),
            Type::String => f.write_str("string"),
            Type::Array(a) => write!(f, "{}[]", a.elem),
            Type::Struct(_) => f.write_str("struct"),
            Type::Function(sig) => {
                f.write_str("(")?;
                for (i, p) in sig.params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {}", sig.ret)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_types() {
        assert_eq!(Constant::Int32(3).ty(), Primitive::Int32);
        assert_eq!(Constant::Float32(0.5).ty(), Primitive::Float32);
        assert_eq!(Constant::Bool(true).ty(), Primitive::Bool);
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(Primitive::Int32.zero(), Some(Constant::Int32(0)));
        assert_eq!(Primitive::Float32.zero(), Some(Constant::Float32(0.0)));
        assert_eq!(Primitive::Bool.zero(), Some(Constant::Bool(false)));
        assert_eq!(Primitive::Void.zero(), None);
    }

    #[test]
    fn test_type_display() {
        let sig = FunctionType {
            params: vec![Primitive::Float32, Primitive::Int32],
            ret: Primitive::Void,
        };
        assert_eq!(Type::Function(sig).to_string(), "(float, int) -> void");
        let arr = ArrayType {
            elem: Primitive::Float32,
            length: 128,
            offset: 0,
        };
        assert_eq!(Type::Array(arr).to_string(), "float[]");
    }

    #[test]
    fn test_array_byte_size() {
        let arr = ArrayType {
            elem: Primitive::Float32,
            length: 128,
            offset: 512,
        };
        assert_eq!(arr.byte_size(), 512);
    }
}
