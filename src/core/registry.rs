use crate::adapters::{convert, css, html, javascript, json, xml};
use crate::domain::model::{Format, OperationKind};
use crate::domain::ports::Adapter;
use crate::utils::error::{Result, ServiceError, TransformError};
use std::collections::HashMap;
use std::fmt;

/// Key of one registered transform. `target` is only set for conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Route {
    pub kind: OperationKind,
    pub source: Format,
    pub target: Option<Format>,
}

impl Route {
    pub fn convert(source: Format, target: Format) -> Self {
        Self {
            kind: OperationKind::Convert,
            source,
            target: Some(target),
        }
    }

    pub fn format(format: Format) -> Self {
        Self {
            kind: OperationKind::Format,
            source: format,
            target: None,
        }
    }

    pub fn validate(format: Format) -> Self {
        Self {
            kind: OperationKind::Validate,
            source: format,
            target: None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            Some(target) => write!(f, "{} {} to {}", self.kind, self.source, target),
            None => write!(f, "{} {}", self.kind, self.source),
        }
    }
}

/// Static lookup table from route to adapter, filled once at startup.
#[derive(Debug, Default)]
pub struct Registry {
    routes: HashMap<Route, Adapter>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The transforms the service ships with.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();

        registry.register(
            Route::convert(Format::Xml, Format::Json),
            Adapter::Convert(convert::xml_to_json),
        )?;
        registry.register(
            Route::convert(Format::Json, Format::Xml),
            Adapter::Convert(convert::json_to_xml),
        )?;
        registry.register(
            Route::convert(Format::Csv, Format::Json),
            Adapter::Convert(convert::csv_to_json),
        )?;
        registry.register(
            Route::convert(Format::Json, Format::Csv),
            Adapter::Convert(convert::json_to_csv),
        )?;

        registry.register(Route::format(Format::Json), Adapter::Format(json::format))?;
        registry.register(Route::format(Format::Xml), Adapter::Format(xml::format))?;
        registry.register(Route::format(Format::Html), Adapter::Format(html::format))?;
        registry.register(Route::format(Format::Css), Adapter::Format(css::format))?;
        registry.register(
            Route::format(Format::JavaScript),
            Adapter::Format(javascript::format),
        )?;

        registry.register(Route::validate(Format::Json), Adapter::Validate(json::validate))?;
        registry.register(Route::validate(Format::Xml), Adapter::Validate(xml::validate))?;
        registry.register(Route::validate(Format::Html), Adapter::Validate(html::validate))?;
        registry.register(Route::validate(Format::Css), Adapter::Validate(css::validate))?;

        tracing::debug!("Registered {} built-in transforms", registry.len());
        Ok(registry)
    }

    /// Adds a route. The adapter must match the route's operation kind,
    /// conversions need a target, other operations must not have one, and a
    /// route can only be registered once.
    pub fn register(&mut self, route: Route, adapter: Adapter) -> Result<()> {
        if adapter.kind() != route.kind {
            return Err(ServiceError::RegistryError {
                message: format!("{adapter:?} cannot serve route '{route}'"),
            });
        }
        match (route.kind, route.target) {
            (OperationKind::Convert, None) => {
                return Err(ServiceError::RegistryError {
                    message: format!("route '{route}' has no target format"),
                })
            }
            (OperationKind::Format | OperationKind::Validate, Some(_)) => {
                return Err(ServiceError::RegistryError {
                    message: format!("route '{route}' must not have a target format"),
                })
            }
            _ => {}
        }
        if self.routes.contains_key(&route) {
            return Err(ServiceError::RegistryError {
                message: format!("route '{route}' is already registered"),
            });
        }

        self.routes.insert(route, adapter);
        Ok(())
    }

    pub fn resolve(
        &self,
        kind: OperationKind,
        source: Format,
        target: Option<Format>,
    ) -> std::result::Result<Adapter, TransformError> {
        let route = Route {
            kind,
            source,
            target,
        };
        self.routes
            .get(&route)
            .copied()
            .ok_or_else(|| TransformError::UnsupportedOperation {
                operation: kind.to_string(),
                format: match target {
                    Some(target) => format!("{source} to {target}"),
                    None => source.to_string(),
                },
            })
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered routes in a stable order.
    pub fn routes(&self) -> Vec<Route> {
        let mut routes: Vec<Route> = self.routes.keys().copied().collect();
        routes.sort_by_key(|route| route.to_string());
        routes
    }
}
