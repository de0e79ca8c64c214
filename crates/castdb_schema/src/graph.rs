//! Raw model graphs: declared models before any derivation.
//!
//! A [`RawGraph`] is the application-authored input. Declarations use
//! builder-style construction:
//!
//! ```
//! use castdb_schema::{RawDecl, RawGraph, RawType};
//!
//! let mut graph = RawGraph::new();
//! graph
//!     .declare(
//!         "Person",
//!         RawDecl::data()
//!             .property("name", RawType::Str)
//!             .property("age", RawType::Number),
//!     )
//!     .unwrap();
//! ```

use std::collections::BTreeMap;

use crate::error::{SchemaError, SchemaResult};
use crate::model::ModelKind;

/// A raw type expression attached to a property or base argument.
#[derive(Debug, Clone, PartialEq)]
pub enum RawType {
    /// The boolean primitive.
    Bool,
    /// The floating-point number primitive.
    Number,
    /// The string primitive.
    Str,
    /// A literal boolean type.
    BoolLiteral(bool),
    /// A literal number type.
    NumberLiteral(f64),
    /// A literal string type.
    StringLiteral(String),
    /// A named reference: a declared model, or a generic parameter in scope.
    Name(String),
}

impl RawType {
    /// Shorthand for a named reference.
    pub fn name(symbol: impl Into<String>) -> Self {
        Self::Name(symbol.into())
    }
}

/// A generic parameter declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawParameter {
    /// The parameter name.
    pub name: String,
    /// Whether arguments must resolve to data-model references.
    pub constrained: bool,
}

/// A base-template reference with positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBase {
    /// The referenced template symbol.
    pub target: String,
    /// Arguments in the target's parameter declaration order.
    pub arguments: Vec<RawType>,
}

impl RawBase {
    /// Creates a base reference without arguments.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            arguments: Vec::new(),
        }
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn argument(mut self, argument: RawType) -> Self {
        self.arguments.push(argument);
        self
    }
}

/// A declared model before derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDecl {
    kind: ModelKind,
    properties: Vec<(String, RawType)>,
    bases: Vec<RawBase>,
    parameters: Vec<RawParameter>,
}

impl RawDecl {
    fn with_kind(kind: ModelKind) -> Self {
        Self {
            kind,
            properties: Vec::new(),
            bases: Vec::new(),
            parameters: Vec::new(),
        }
    }

    /// Starts a data-model declaration.
    #[must_use]
    pub fn data() -> Self {
        Self::with_kind(ModelKind::Data)
    }

    /// Starts a concrete-template declaration.
    #[must_use]
    pub fn concrete_template() -> Self {
        Self::with_kind(ModelKind::ConcreteTemplate)
    }

    /// Starts a generic-template declaration.
    #[must_use]
    pub fn generic_template() -> Self {
        Self::with_kind(ModelKind::GenericTemplate)
    }

    /// Adds a property. Later declarations of the same key win.
    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: RawType) -> Self {
        self.properties.push((key.into(), value));
        self
    }

    /// Adds a base-template reference.
    #[must_use]
    pub fn base(mut self, base: RawBase) -> Self {
        self.bases.push(base);
        self
    }

    /// Adds an unconstrained generic parameter.
    #[must_use]
    pub fn parameter(mut self, name: impl Into<String>) -> Self {
        self.parameters.push(RawParameter {
            name: name.into(),
            constrained: false,
        });
        self
    }

    /// Adds a generic parameter constrained to data-model references.
    #[must_use]
    pub fn constrained_parameter(mut self, name: impl Into<String>) -> Self {
        self.parameters.push(RawParameter {
            name: name.into(),
            constrained: true,
        });
        self
    }

    /// Returns the declared kind.
    #[must_use]
    pub const fn kind(&self) -> ModelKind {
        self.kind
    }

    /// Returns the declared properties in authoring order.
    #[must_use]
    pub fn properties(&self) -> &[(String, RawType)] {
        &self.properties
    }

    /// Returns the declared base references in authoring order.
    #[must_use]
    pub fn bases(&self) -> &[RawBase] {
        &self.bases
    }

    /// Returns the declared generic parameters in authoring order.
    #[must_use]
    pub fn parameters(&self) -> &[RawParameter] {
        &self.parameters
    }

    /// Looks up a generic parameter by name.
    #[must_use]
    pub fn parameter_named(&self, name: &str) -> Option<&RawParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// A set of declared models keyed by symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGraph {
    decls: BTreeMap<String, RawDecl>,
}

impl RawGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a model under `symbol`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidSymbol`] unless the symbol is an
    /// identifier (`[A-Za-z_][A-Za-z0-9_]*`), and
    /// [`SchemaError::DuplicateSymbol`] if the symbol is already taken.
    pub fn declare(&mut self, symbol: impl Into<String>, decl: RawDecl) -> SchemaResult<()> {
        let symbol = symbol.into();
        if !is_identifier(&symbol) {
            return Err(SchemaError::InvalidSymbol { symbol });
        }
        if self.decls.contains_key(&symbol) {
            return Err(SchemaError::DuplicateSymbol { symbol });
        }
        self.decls.insert(symbol, decl);
        Ok(())
    }

    /// Looks up a declaration by symbol.
    #[must_use]
    pub fn decl(&self, symbol: &str) -> Option<&RawDecl> {
        self.decls.get(symbol)
    }

    /// Iterates declared symbols in lexicographic order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.decls.keys().map(String::as_str)
    }

    /// Returns the number of declarations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.decls.len()
    }

    /// Returns `true` if nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}

fn is_identifier(symbol: &str) -> bool {
    let mut chars = symbol.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_accepts_identifiers() {
        let mut graph = RawGraph::new();
        graph.declare("Person", RawDecl::data()).unwrap();
        graph.declare("_private", RawDecl::data()).unwrap();
        graph.declare("Model2", RawDecl::data()).unwrap();
        assert_eq!(graph.len(), 3);
        assert!(graph.decl("Person").is_some());
    }

    #[test]
    fn declare_rejects_non_identifiers() {
        let mut graph = RawGraph::new();
        for symbol in ["", "2fast", "has space", "kebab-case", "dot.ted"] {
            let err = graph.declare(symbol, RawDecl::data()).unwrap_err();
            assert!(matches!(err, SchemaError::InvalidSymbol { .. }), "{symbol}");
        }
        assert!(graph.is_empty());
    }

    #[test]
    fn declare_rejects_duplicates() {
        let mut graph = RawGraph::new();
        graph.declare("Person", RawDecl::data()).unwrap();
        let err = graph
            .declare("Person", RawDecl::concrete_template())
            .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::DuplicateSymbol { symbol } if symbol == "Person"
        ));
    }

    #[test]
    fn symbols_iterate_sorted() {
        let mut graph = RawGraph::new();
        graph.declare("Zoo", RawDecl::data()).unwrap();
        graph.declare("Ant", RawDecl::data()).unwrap();
        let symbols: Vec<&str> = graph.symbols().collect();
        assert_eq!(symbols, ["Ant", "Zoo"]);
    }

    #[test]
    fn decl_builder_collects_everything() {
        let decl = RawDecl::generic_template()
            .parameter("T")
            .constrained_parameter("U")
            .property("flag", RawType::Bool)
            .base(RawBase::new("Named").argument(RawType::name("T")));
        assert_eq!(decl.kind(), ModelKind::GenericTemplate);
        assert_eq!(decl.properties().len(), 1);
        assert_eq!(decl.bases().len(), 1);
        assert_eq!(decl.parameters().len(), 2);
        assert!(decl.parameter_named("U").is_some_and(|p| p.constrained));
        assert!(decl.parameter_named("T").is_some_and(|p| !p.constrained));
        assert!(decl.parameter_named("V").is_none());
    }
}
