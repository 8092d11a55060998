//! Parsed signatures of the exported host functions.

use std::fmt::{self, Write as _};

use serde::Serialize;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{Error, Result};

/// A single named parameter of an exported function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Parameter {
    /// Parameter name, used by the forwarder to pass the argument on.
    pub name: String,
    /// Normalized type text, e.g. `const char*`.
    #[serde(rename = "type")]
    pub ty: String,
}

impl Parameter {
    /// Creates a parameter.
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// One exported host function.
///
/// Equality ignores [`Self::line`]: two declarations that only differ in
/// layout are the same signature.
#[derive(Debug, Clone, Eq, Serialize)]
pub struct ApiFunctionSignature {
    /// Function name.
    pub name: String,
    /// Parameters in declaration order. Empty for `()` and `(void)`.
    pub parameters: Vec<Parameter>,
    /// Normalized return type text.
    pub return_type: String,
    /// Header line the declaration starts on.
    #[serde(skip)]
    pub line: usize,
}

impl PartialEq for ApiFunctionSignature {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.parameters == other.parameters
            && self.return_type == other.return_type
    }
}

impl ApiFunctionSignature {
    /// Whether the function returns nothing.
    #[must_use]
    pub fn returns_void(&self) -> bool {
        self.return_type == "void"
    }

    /// Parameter types joined for a prototype without names, `void` when
    /// there are no parameters.
    #[must_use]
    pub fn type_list(&self) -> String {
        if self.parameters.is_empty() {
            return "void".into();
        }
        join(self.parameters.iter().map(|p| p.ty.as_str()))
    }

    /// Full parameter list with names, `void` when there are no parameters.
    #[must_use]
    pub fn parameter_list(&self) -> String {
        if self.parameters.is_empty() {
            return "void".into();
        }
        self.parameters
            .iter()
            .map(|p| format!("{} {}", p.ty, p.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Argument names joined for a call expression.
    #[must_use]
    pub fn argument_list(&self) -> String {
        join(self.parameters.iter().map(|p| p.name.as_str()))
    }
}

impl fmt::Display for ApiFunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}({});",
            self.return_type,
            self.name,
            self.type_list()
        )
    }
}

fn join<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts.collect::<Vec<_>>().join(", ")
}

/// Ordered, duplicate-free list of signatures.
///
/// Every emitter walks this list front to back, so table layout, typedefs,
/// forwarders and initializers always agree on order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SignatureSet(Vec<ApiFunctionSignature>);

impl SignatureSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a signature.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateName`] if a function with the same name is
    /// already present.
    pub fn push(&mut self, signature: ApiFunctionSignature) -> Result<()> {
        if let Some(first) = self.0.iter().find(|s| s.name == signature.name) {
            return Err(Error::DuplicateName {
                name: signature.name,
                first_line: first.line,
                line: signature.line,
            });
        }
        self.0.push(signature);
        Ok(())
    }

    /// Number of signatures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the signatures in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, ApiFunctionSignature> {
        self.0.iter()
    }

    /// Looks up a signature by function name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ApiFunctionSignature> {
        self.0.iter().find(|s| s.name == name)
    }

    /// Canonical text the fingerprint is computed over: one prototype per
    /// line, in order.
    #[must_use]
    pub fn canonical(&self) -> String {
        let mut buf = String::new();
        for signature in &self.0 {
            // Writing into a String cannot fail.
            let _ = writeln!(buf, "{signature}");
        }
        buf
    }

    /// xxh3-64 hash of [`Self::canonical`]. Any change to the order, names
    /// or types of the exported functions changes the fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        xxh3_64(self.canonical().as_bytes())
    }
}

impl<'a> IntoIterator for &'a SignatureSet {
    type Item = &'a ApiFunctionSignature;
    type IntoIter = std::slice::Iter<'a, ApiFunctionSignature>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl TryFrom<Vec<ApiFunctionSignature>> for SignatureSet {
    type Error = Error;

    fn try_from(signatures: Vec<ApiFunctionSignature>) -> Result<Self> {
        let mut set = Self::new();
        for signature in signatures {
            set.push(signature)?;
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(name: &str, params: &[(&str, &str)], ret: &str, line: usize) -> ApiFunctionSignature {
        ApiFunctionSignature {
            name: name.into(),
            parameters: params.iter().map(|(n, t)| Parameter::new(*n, *t)).collect(),
            return_type: ret.into(),
            line,
        }
    }

    #[test]
    fn test_lists() {
        let s = sig("pkSetGlobal", &[("vm", "PKVM*"), ("val", "int")], "void", 1);
        assert!(s.returns_void());
        assert_eq!(s.type_list(), "PKVM*, int");
        assert_eq!(s.parameter_list(), "PKVM* vm, int val");
        assert_eq!(s.argument_list(), "vm, val");
        assert_eq!(s.to_string(), "void pkSetGlobal(PKVM*, int);");

        let empty = sig("pkNewConfiguration", &[], "PkConfiguration", 1);
        assert_eq!(empty.type_list(), "void");
        assert_eq!(empty.parameter_list(), "void");
        assert_eq!(empty.argument_list(), "");
    }

    #[test]
    fn test_equality_ignores_line() {
        assert_eq!(sig("a", &[], "int", 3), sig("a", &[], "int", 40));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut set = SignatureSet::new();
        set.push(sig("a", &[], "void", 3)).unwrap();
        let err = set.push(sig("a", &[("x", "int")], "void", 9)).unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateName { name, first_line: 3, line: 9 } if name == "a"
        ));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_fingerprint_tracks_order_and_types() {
        let a = sig("a", &[("x", "int")], "void", 1);
        let b = sig("b", &[], "int", 2);

        let ab = SignatureSet::try_from(vec![a.clone(), b.clone()]).unwrap();
        let ab_again = SignatureSet::try_from(vec![a.clone(), b.clone()]).unwrap();
        let ba = SignatureSet::try_from(vec![b.clone(), a.clone()]).unwrap();
        let retyped =
            SignatureSet::try_from(vec![sig("a", &[("x", "long")], "void", 1), b]).unwrap();

        assert_eq!(ab.fingerprint(), ab_again.fingerprint());
        assert_ne!(ab.fingerprint(), ba.fingerprint());
        assert_ne!(ab.fingerprint(), retyped.fingerprint());
        assert_eq!(ab.canonical(), "void a(int);\nint b(void);\n");
    }

    #[test]
    fn test_parameter_names_do_not_affect_fingerprint() {
        let x = SignatureSet::try_from(vec![sig("a", &[("x", "int")], "void", 1)]).unwrap();
        let y = SignatureSet::try_from(vec![sig("a", &[("y", "int")], "void", 1)]).unwrap();
        assert_eq!(x.fingerprint(), y.fingerprint());
    }
}
