//! Derived model types: classified elements, template references, and models.

use std::collections::BTreeMap;
use std::fmt;

/// The kind of a declared or derived model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// A concrete record shape that rows are written against.
    Data,
    /// A reusable property bundle without generic parameters.
    ConcreteTemplate,
    /// A reusable property bundle parameterized over elements.
    GenericTemplate,
}

impl ModelKind {
    /// Returns `true` for either template kind.
    #[must_use]
    pub const fn is_template(self) -> bool {
        matches!(self, Self::ConcreteTemplate | Self::GenericTemplate)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Data => "data",
            Self::ConcreteTemplate => "concrete template",
            Self::GenericTemplate => "generic template",
        };
        write!(f, "{name}")
    }
}

/// The shape tag of an element, without its payload.
///
/// Tags are stable across releases; serialized encoding schemas store them
/// as single bytes via [`ElementKind::as_byte`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// A boolean value field.
    BoolPrimitive,
    /// A floating-point number value field.
    NumberPrimitive,
    /// A UTF-8 string value field.
    StringPrimitive,
    /// A fixed boolean baked into the schema.
    BoolLiteral,
    /// A fixed number baked into the schema.
    NumberLiteral,
    /// A fixed string baked into the schema.
    StringLiteral,
    /// A reference to another declared model.
    ModelRef,
    /// An unconstrained generic parameter.
    Parameter,
    /// A generic parameter restricted to data models.
    ConstrainedParameter,
}

impl ElementKind {
    /// Returns `true` if the kind is one of the literal shapes.
    #[must_use]
    pub const fn is_literal(self) -> bool {
        matches!(
            self,
            Self::BoolLiteral | Self::NumberLiteral | Self::StringLiteral
        )
    }

    /// Returns `true` if the kind is one of the parameter shapes.
    #[must_use]
    pub const fn is_parameter(self) -> bool {
        matches!(self, Self::Parameter | Self::ConstrainedParameter)
    }

    /// Returns `true` if a field of this kind occupies a row slot.
    ///
    /// Literals are baked into the schema and parameters are resolved away
    /// before encoding, so only primitives and model references remain.
    #[must_use]
    pub const fn is_storable(self) -> bool {
        matches!(
            self,
            Self::BoolPrimitive | Self::NumberPrimitive | Self::StringPrimitive | Self::ModelRef
        )
    }

    /// Returns the stable single-byte tag for this kind.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::BoolPrimitive => 1,
            Self::NumberPrimitive => 2,
            Self::StringPrimitive => 3,
            Self::BoolLiteral => 4,
            Self::NumberLiteral => 5,
            Self::StringLiteral => 6,
            Self::ModelRef => 7,
            Self::Parameter => 8,
            Self::ConstrainedParameter => 9,
        }
    }

    /// Parses a stable single-byte tag back into a kind.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::BoolPrimitive),
            2 => Some(Self::NumberPrimitive),
            3 => Some(Self::StringPrimitive),
            4 => Some(Self::BoolLiteral),
            5 => Some(Self::NumberLiteral),
            6 => Some(Self::StringLiteral),
            7 => Some(Self::ModelRef),
            8 => Some(Self::Parameter),
            9 => Some(Self::ConstrainedParameter),
            _ => None,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BoolPrimitive => "boolean",
            Self::NumberPrimitive => "number",
            Self::StringPrimitive => "string",
            Self::BoolLiteral => "boolean literal",
            Self::NumberLiteral => "number literal",
            Self::StringLiteral => "string literal",
            Self::ModelRef => "model reference",
            Self::Parameter => "parameter",
            Self::ConstrainedParameter => "constrained parameter",
        };
        write!(f, "{name}")
    }
}

/// A classified property value.
///
/// Literal payloads are kept as canonical text so schemas compare and
/// serialize without floating-point surprises.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Element {
    /// A boolean value field.
    BoolPrimitive,
    /// A number value field.
    NumberPrimitive,
    /// A string value field.
    StringPrimitive,
    /// A fixed boolean, rendered as `"true"` or `"false"`.
    BoolLiteral(String),
    /// A fixed number, rendered in canonical decimal text.
    NumberLiteral(String),
    /// A fixed string.
    StringLiteral(String),
    /// A reference to another declared model, by symbol.
    ModelRef(String),
    /// An unconstrained generic parameter, by name.
    Parameter(String),
    /// A constrained generic parameter, by name.
    ConstrainedParameter(String),
}

impl Element {
    /// Returns the shape tag of this element.
    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        match self {
            Self::BoolPrimitive => ElementKind::BoolPrimitive,
            Self::NumberPrimitive => ElementKind::NumberPrimitive,
            Self::StringPrimitive => ElementKind::StringPrimitive,
            Self::BoolLiteral(_) => ElementKind::BoolLiteral,
            Self::NumberLiteral(_) => ElementKind::NumberLiteral,
            Self::StringLiteral(_) => ElementKind::StringLiteral,
            Self::ModelRef(_) => ElementKind::ModelRef,
            Self::Parameter(_) => ElementKind::Parameter,
            Self::ConstrainedParameter(_) => ElementKind::ConstrainedParameter,
        }
    }

    /// Returns `true` if the element is a literal.
    #[must_use]
    pub const fn is_literal(&self) -> bool {
        self.kind().is_literal()
    }

    /// Returns `true` if the element is a generic parameter.
    #[must_use]
    pub const fn is_parameter(&self) -> bool {
        self.kind().is_parameter()
    }

    /// Returns the canonical text of a literal element, if it is one.
    #[must_use]
    pub fn literal_text(&self) -> Option<&str> {
        match self {
            Self::BoolLiteral(text) | Self::NumberLiteral(text) | Self::StringLiteral(text) => {
                Some(text)
            }
            _ => None,
        }
    }

    /// Returns the referenced model symbol, if the element is a reference.
    #[must_use]
    pub fn model_ref(&self) -> Option<&str> {
        match self {
            Self::ModelRef(symbol) => Some(symbol),
            _ => None,
        }
    }
}

/// A reference from a model to one of its base templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRef {
    /// A base without generic arguments.
    Concrete {
        /// The referenced template symbol.
        target: String,
    },
    /// A base with elements bound to each of its parameters.
    Generic {
        /// The referenced template symbol.
        target: String,
        /// Argument elements keyed by the target's parameter names.
        arguments: BTreeMap<String, Element>,
    },
}

impl TemplateRef {
    /// Returns the referenced template symbol.
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::Concrete { target } | Self::Generic { target, .. } => target,
        }
    }
}

/// A derived model: classified properties plus base-template references.
///
/// Models come out of [`SchemaBuilder::derive`](crate::SchemaBuilder::derive)
/// and are shared behind [`Arc`](std::sync::Arc) so repeated references to
/// the same symbol observe one derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    symbol: String,
    kind: ModelKind,
    properties: BTreeMap<String, Element>,
    templates: Vec<TemplateRef>,
    parameters: Vec<String>,
}

impl Model {
    pub(crate) fn new(
        symbol: String,
        kind: ModelKind,
        properties: BTreeMap<String, Element>,
        templates: Vec<TemplateRef>,
        parameters: Vec<String>,
    ) -> Self {
        Self {
            symbol,
            kind,
            properties,
            templates,
            parameters,
        }
    }

    /// Returns the declared symbol.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the model kind.
    #[must_use]
    pub const fn kind(&self) -> ModelKind {
        self.kind
    }

    /// Returns the model's own classified properties, keyed by name.
    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, Element> {
        &self.properties
    }

    /// Returns the base-template references in declaration order.
    #[must_use]
    pub fn templates(&self) -> &[TemplateRef] {
        &self.templates
    }

    /// Returns the generic parameter names in declaration order.
    ///
    /// Empty unless the model is a generic template.
    #[must_use]
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }
}
