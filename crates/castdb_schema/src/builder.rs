//! Intermediate schema derivation.
//!
//! [`SchemaBuilder`] walks a [`RawGraph`] and classifies every declared
//! property into an [`Element`]. Each symbol is walked at most once: the
//! derived [`Model`] is memoized behind an [`Arc`], and later references to
//! the same symbol are served from the cache so the whole derivation of a
//! graph stays linear in its size.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::error::{SchemaError, SchemaResult};
use crate::graph::{RawBase, RawDecl, RawGraph, RawType};
use crate::model::{Element, Model, ModelKind, TemplateRef};

/// Counters describing how much work a builder has done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuilderStats {
    /// Symbols actually walked (cache misses).
    pub models_walked: usize,
    /// Derivations served straight from the memo table.
    pub cache_hits: usize,
}

/// Derives [`Model`]s from a [`RawGraph`], memoizing by symbol.
#[derive(Debug)]
pub struct SchemaBuilder<'g> {
    graph: &'g RawGraph,
    cache: HashMap<String, Arc<Model>>,
    visiting: HashSet<String>,
    stats: BuilderStats,
}

impl<'g> SchemaBuilder<'g> {
    /// Creates a builder over `graph` with an empty memo table.
    #[must_use]
    pub fn new(graph: &'g RawGraph) -> Self {
        Self {
            graph,
            cache: HashMap::new(),
            visiting: HashSet::new(),
            stats: BuilderStats::default(),
        }
    }

    /// Returns the graph this builder derives from.
    #[must_use]
    pub fn graph(&self) -> &'g RawGraph {
        self.graph
    }

    /// Returns the already-derived model for `symbol`, if any.
    #[must_use]
    pub fn model(&self, symbol: &str) -> Option<&Arc<Model>> {
        self.cache.get(symbol)
    }

    /// Returns the work counters accumulated so far.
    #[must_use]
    pub const fn stats(&self) -> BuilderStats {
        self.stats
    }

    /// Derives the model declared under `symbol`, expecting `kind`.
    ///
    /// Repeated calls for the same symbol return the same [`Arc`]. The
    /// expected kind is checked against both the cache and the declaration,
    /// so a symbol can never be observed under two different kinds.
    ///
    /// # Errors
    ///
    /// [`SchemaError::UnknownSymbol`] if nothing is declared under `symbol`,
    /// [`SchemaError::KindCollision`] if the declared or cached kind differs
    /// from `kind`, and [`SchemaError::TemplateCycle`] if the derivation
    /// re-enters a symbol it is already walking through a base reference.
    pub fn derive(&mut self, symbol: &str, kind: ModelKind) -> SchemaResult<Arc<Model>> {
        if let Some(cached) = self.cache.get(symbol) {
            if cached.kind() != kind {
                return Err(SchemaError::KindCollision {
                    symbol: symbol.to_string(),
                    requested: kind,
                    declared: cached.kind(),
                });
            }
            let cached = Arc::clone(cached);
            self.stats.cache_hits += 1;
            return Ok(cached);
        }
        if self.visiting.contains(symbol) {
            return Err(SchemaError::TemplateCycle {
                symbol: symbol.to_string(),
            });
        }
        let graph = self.graph;
        let decl = graph
            .decl(symbol)
            .ok_or_else(|| SchemaError::unknown_symbol(symbol))?;
        if decl.kind() != kind {
            return Err(SchemaError::KindCollision {
                symbol: symbol.to_string(),
                requested: kind,
                declared: decl.kind(),
            });
        }
        self.visiting.insert(symbol.to_string());
        let walked = self.walk(symbol, decl);
        self.visiting.remove(symbol);
        let model = Arc::new(walked?);
        self.cache.insert(symbol.to_string(), Arc::clone(&model));
        self.stats.models_walked += 1;
        Ok(model)
    }

    /// Derives every declared symbol, in lexicographic order.
    ///
    /// # Errors
    ///
    /// Propagates the first derivation failure.
    pub fn derive_all(&mut self) -> SchemaResult<Vec<Arc<Model>>> {
        let symbols: Vec<String> = self.graph.symbols().map(str::to_string).collect();
        let mut models = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let kind = self
                .graph
                .decl(&symbol)
                .map(RawDecl::kind)
                .ok_or_else(|| SchemaError::unknown_symbol(&symbol))?;
            models.push(self.derive(&symbol, kind)?);
        }
        Ok(models)
    }

    fn walk(&mut self, symbol: &str, decl: &'g RawDecl) -> SchemaResult<Model> {
        let templates = self.walk_bases(symbol, decl)?;
        let mut properties = BTreeMap::new();
        for (key, raw) in decl.properties() {
            let element = self.classify(symbol, decl, key, raw)?;
            properties.insert(key.clone(), element);
        }
        let parameters = decl.parameters().iter().map(|p| p.name.clone()).collect();
        Ok(Model::new(
            symbol.to_string(),
            decl.kind(),
            properties,
            templates,
            parameters,
        ))
    }

    /// Classifies one raw type in fixed matcher priority: literals first,
    /// then primitives, then declared models, and only inside a generic
    /// template body the declaring model's own parameters.
    fn classify(
        &mut self,
        symbol: &str,
        body: &'g RawDecl,
        property: &str,
        raw: &RawType,
    ) -> SchemaResult<Element> {
        match raw {
            RawType::BoolLiteral(value) => Ok(Element::BoolLiteral(
                if *value { "true" } else { "false" }.to_string(),
            )),
            RawType::NumberLiteral(value) => Ok(Element::NumberLiteral(number_text(*value))),
            RawType::StringLiteral(value) => Ok(Element::StringLiteral(value.clone())),
            RawType::Bool => Ok(Element::BoolPrimitive),
            RawType::Number => Ok(Element::NumberPrimitive),
            RawType::Str => Ok(Element::StringPrimitive),
            RawType::Name(name) => self.classify_name(symbol, body, property, name),
        }
    }

    /// Resolves a name against declared models, then the body's parameters.
    ///
    /// A declared model shadows a parameter of the same name. Referencing a
    /// model that is still being walked yields a plain reference without
    /// re-deriving it; the in-flight walk completes it.
    fn classify_name(
        &mut self,
        symbol: &str,
        body: &'g RawDecl,
        property: &str,
        name: &str,
    ) -> SchemaResult<Element> {
        let graph = self.graph;
        if let Some(target) = graph.decl(name) {
            if !self.cache.contains_key(name) && !self.visiting.contains(name) {
                self.derive(name, target.kind())?;
            }
            return Ok(Element::ModelRef(name.to_string()));
        }
        if body.kind() == ModelKind::GenericTemplate {
            if let Some(parameter) = body.parameter_named(name) {
                let element = if parameter.constrained {
                    Element::ConstrainedParameter(name.to_string())
                } else {
                    Element::Parameter(name.to_string())
                };
                return Ok(element);
            }
        }
        Err(SchemaError::InvalidElement {
            model: symbol.to_string(),
            property: property.to_string(),
        })
    }

    fn walk_bases(&mut self, symbol: &str, decl: &'g RawDecl) -> SchemaResult<Vec<TemplateRef>> {
        let mut templates = Vec::with_capacity(decl.bases().len());
        for base in decl.bases() {
            templates.push(self.walk_base(symbol, decl, base)?);
        }
        Ok(templates)
    }

    fn walk_base(
        &mut self,
        symbol: &str,
        body: &'g RawDecl,
        base: &'g RawBase,
    ) -> SchemaResult<TemplateRef> {
        let graph = self.graph;
        let Some(target) = graph.decl(&base.target) else {
            return Err(SchemaError::invalid_template(
                symbol,
                format!("base {} is not declared", base.target),
            ));
        };
        if !target.kind().is_template() {
            return Err(SchemaError::invalid_template(
                symbol,
                format!("base {} is a data model, not a template", base.target),
            ));
        }
        self.derive(&base.target, target.kind())?;
        let parameters = target.parameters();
        if parameters.is_empty() {
            if !base.arguments.is_empty() {
                return Err(SchemaError::invalid_template(
                    symbol,
                    format!("base {} takes no arguments", base.target),
                ));
            }
            return Ok(TemplateRef::Concrete {
                target: base.target.clone(),
            });
        }
        if base.arguments.len() != parameters.len() {
            return Err(SchemaError::invalid_template(
                symbol,
                format!(
                    "base {} expects {} argument(s), found {}",
                    base.target,
                    parameters.len(),
                    base.arguments.len()
                ),
            ));
        }
        let mut arguments = BTreeMap::new();
        for (parameter, raw) in parameters.iter().zip(&base.arguments) {
            let element = self.classify(symbol, body, &parameter.name, raw)?;
            if parameter.constrained && !argument_satisfies_constraint(self, &element) {
                return Err(SchemaError::invalid_template(
                    symbol,
                    format!(
                        "argument for constrained parameter {} of {} must reference a data model",
                        parameter.name, base.target
                    ),
                ));
            }
            arguments.insert(parameter.name.clone(), element);
        }
        Ok(TemplateRef::Generic {
            target: base.target.clone(),
            arguments,
        })
    }
}

/// Checks an argument bound to a constrained parameter.
///
/// References must point at data models; forwarding another constrained
/// parameter keeps the obligation alive, so it passes too.
fn argument_satisfies_constraint(builder: &SchemaBuilder<'_>, element: &Element) -> bool {
    match element {
        Element::ModelRef(target) => builder
            .graph()
            .decl(target)
            .is_some_and(|decl| decl.kind() == ModelKind::Data),
        Element::ConstrainedParameter(_) => true,
        _ => false,
    }
}

fn number_text(value: f64) -> String {
    format!("{value}")
}
