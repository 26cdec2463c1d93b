//! Static table of the console resources this tool knows how to export.

use crate::error::ConfigError;

/// How an endpoint walks through its result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationKind {
    /// Single request, any cursor in the body is ignored
    None,
    /// `cursor` query parameter threaded from `pagination.nextCursor`
    Cursor,
    /// `skip`/`limit` query parameters
    Offset,
}

impl PaginationKind {
    pub fn name(&self) -> &'static str {
        match self {
            PaginationKind::None => "none",
            PaginationKind::Cursor => "cursor",
            PaginationKind::Offset => "offset",
        }
    }
}

/// One exportable API resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub name: &'static str,
    pub path: &'static str,
    pub pagination: PaginationKind,
    /// Page size sent as `limit`; unused for unpaginated endpoints
    pub page_size: u32,
    pub output_file: &'static str,
}

const ENDPOINTS: &[EndpointDescriptor] = &[
    EndpointDescriptor {
        name: "sites",
        path: "/sites",
        pagination: PaginationKind::Cursor,
        page_size: 100,
        output_file: "sites.csv",
    },
    EndpointDescriptor {
        name: "policies",
        path: "/policies",
        pagination: PaginationKind::None,
        page_size: 0,
        output_file: "policies.csv",
    },
    EndpointDescriptor {
        name: "exclusions",
        path: "/exclusions",
        pagination: PaginationKind::Cursor,
        page_size: 100,
        output_file: "exclusions.csv",
    },
    EndpointDescriptor {
        name: "deployments",
        path: "/deployment-packs",
        pagination: PaginationKind::None,
        page_size: 0,
        output_file: "deployments.csv",
    },
    EndpointDescriptor {
        name: "agents",
        path: "/agents",
        pagination: PaginationKind::Cursor,
        page_size: 1000,
        output_file: "agents.csv",
    },
    EndpointDescriptor {
        name: "rules",
        path: "/rules",
        pagination: PaginationKind::Cursor,
        page_size: 100,
        output_file: "rules.csv",
    },
    EndpointDescriptor {
        name: "alerts",
        path: "/alerts",
        pagination: PaginationKind::Cursor,
        page_size: 100,
        output_file: "alerts.csv",
    },
    EndpointDescriptor {
        name: "tokens",
        path: "/api-tokens",
        pagination: PaginationKind::Offset,
        page_size: 100,
        output_file: "tokens.csv",
    },
];

/// Immutable lookup over a fixed set of endpoint descriptors
#[derive(Debug, Clone, Copy)]
pub struct Registry {
    endpoints: &'static [EndpointDescriptor],
}

impl Registry {
    /// The registry of every supported console resource
    pub fn builtin() -> Self {
        Self {
            endpoints: ENDPOINTS,
        }
    }

    #[cfg(test)]
    pub fn from_static(endpoints: &'static [EndpointDescriptor]) -> Self {
        Self { endpoints }
    }

    pub fn all(&self) -> &'static [EndpointDescriptor] {
        self.endpoints
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.endpoints.iter().map(|e| e.name).collect()
    }

    /// Look up an endpoint by name, ignoring ASCII case
    pub fn get(&self, name: &str) -> Option<&'static EndpointDescriptor> {
        self.endpoints
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Resolve the endpoints to run
    ///
    /// `None` selects everything in registry order. A subset is returned in
    /// the order given, duplicates collapsed. Every unknown name is reported
    /// at once.
    pub fn select(
        &self,
        names: Option<&[String]>,
    ) -> Result<Vec<&'static EndpointDescriptor>, ConfigError> {
        let Some(names) = names else {
            return Ok(self.endpoints.iter().collect());
        };

        let mut selected: Vec<&'static EndpointDescriptor> = Vec::new();
        let mut unknown = Vec::new();

        for name in names {
            match self.get(name) {
                Some(endpoint) => {
                    if !selected.iter().any(|e| e.name == endpoint.name) {
                        selected.push(endpoint);
                    }
                }
                None => unknown.push(name.clone()),
            }
        }

        if !unknown.is_empty() {
            return Err(ConfigError::UnknownEndpoints {
                unknown,
                known: self.names(),
            });
        }

        Ok(selected)
    }
}
