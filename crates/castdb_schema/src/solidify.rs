//! Schema solidification: template merging and parameter substitution.
//!
//! A derived [`Model`] still carries its template references and, inside
//! generic templates, unresolved parameters. Solidification flattens all of
//! that into a [`SolidModel`]: one property map containing only primitives,
//! literals, and model references, which is what row encoding works from.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::builder::SchemaBuilder;
use crate::error::{SchemaError, SchemaResult};
use crate::graph::RawDecl;
use crate::model::{Element, Model, TemplateRef};

/// Bindings from generic parameter names to resolved elements.
pub type ArgumentEnv = BTreeMap<String, Element>;

/// A model with every template merged and every parameter substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolidModel {
    symbol: String,
    properties: BTreeMap<String, Element>,
}

impl SolidModel {
    /// Returns the symbol of the model this was solidified from.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the flattened property map.
    ///
    /// Every element is a primitive, a literal, or a model reference; no
    /// parameters survive solidification.
    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, Element> {
        &self.properties
    }
}

impl SchemaBuilder<'_> {
    /// Solidifies the model declared under `symbol`.
    ///
    /// The model is derived first if it is not already cached. Templates
    /// merge in declaration order with later templates overwriting earlier
    /// ones on key collision, and the model's own properties overwrite them
    /// all.
    ///
    /// # Errors
    ///
    /// Propagates derivation failures, and returns
    /// [`SchemaError::UnboundParameter`] if a parameter survives with no
    /// binding in scope, which is what happens when a generic template is
    /// solidified directly.
    pub fn solidify(&mut self, symbol: &str) -> SchemaResult<SolidModel> {
        let model = match self.model(symbol) {
            Some(model) => Arc::clone(model),
            None => {
                let kind = self
                    .graph()
                    .decl(symbol)
                    .map(RawDecl::kind)
                    .ok_or_else(|| SchemaError::unknown_symbol(symbol))?;
                self.derive(symbol, kind)?
            }
        };
        let properties = self.solidify_properties(&model, &ArgumentEnv::new())?;
        Ok(SolidModel {
            symbol: symbol.to_string(),
            properties,
        })
    }

    /// Solidifies every data model in the graph.
    ///
    /// Templates are derived along the way but produce no entry here; only
    /// data models get flattened property maps.
    ///
    /// # Errors
    ///
    /// Propagates the first failure.
    pub fn solidify_all(&mut self) -> SchemaResult<Vec<SolidModel>> {
        let symbols: Vec<String> = self.graph().symbols().map(str::to_string).collect();
        let mut solids = Vec::new();
        for symbol in symbols {
            let Some(decl) = self.graph().decl(&symbol) else {
                return Err(SchemaError::unknown_symbol(&symbol));
            };
            if decl.kind().is_template() {
                continue;
            }
            solids.push(self.solidify(&symbol)?);
        }
        Ok(solids)
    }

    fn solidify_properties(
        &self,
        model: &Model,
        env: &ArgumentEnv,
    ) -> SchemaResult<BTreeMap<String, Element>> {
        let mut merged = BTreeMap::new();
        for template in model.templates() {
            let child_env = self.template_environment(model, template, env)?;
            let base = self.model(template.target()).ok_or_else(|| {
                SchemaError::MissingTemplate {
                    model: model.symbol().to_string(),
                    template: template.target().to_string(),
                }
            })?;
            let flattened = self.solidify_properties(base, &child_env)?;
            merged.extend(flattened);
        }
        for (key, element) in model.properties() {
            let resolved = resolve_element(model.symbol(), element, env)?;
            merged.insert(key.clone(), resolved);
        }
        Ok(merged)
    }

    /// Builds the argument environment a base template is entered with.
    ///
    /// Arguments that are themselves parameters are looked up in the
    /// caller's environment; anything else binds as-is.
    fn template_environment(
        &self,
        model: &Model,
        template: &TemplateRef,
        env: &ArgumentEnv,
    ) -> SchemaResult<ArgumentEnv> {
        let TemplateRef::Generic { target, arguments } = template else {
            return Ok(ArgumentEnv::new());
        };
        let base = self
            .model(target)
            .ok_or_else(|| SchemaError::MissingTemplate {
                model: model.symbol().to_string(),
                template: target.clone(),
            })?;
        let mut child = ArgumentEnv::new();
        for parameter in base.parameters() {
            let argument =
                arguments
                    .get(parameter)
                    .ok_or_else(|| SchemaError::UnboundParameter {
                        model: model.symbol().to_string(),
                        parameter: parameter.clone(),
                    })?;
            let bound = resolve_element(model.symbol(), argument, env)?;
            child.insert(parameter.clone(), bound);
        }
        Ok(child)
    }
}

fn resolve_element(model: &str, element: &Element, env: &ArgumentEnv) -> SchemaResult<Element> {
    match element {
        Element::Parameter(name) | Element::ConstrainedParameter(name) => env
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnboundParameter {
                model: model.to_string(),
                parameter: name.clone(),
            }),
        other => Ok(other.clone()),
    }
}
