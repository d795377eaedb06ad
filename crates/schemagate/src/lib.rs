// Role-sensitive payload validation and default injection for service hooks
//
// Rules are declared per resource as phase -> method -> role -> schema and
// registered in a `RegistryStore`. For every invocation the matching rules are
// merged into one effective schema, the phase payload is validated and
// stripped of undeclared fields, and `create` inputs receive role defaults.

pub mod config;
pub mod context;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod registry;
pub mod resolver;
pub mod rule;
pub mod trusted;
pub mod validator;

pub use config::{EngineConfig, HookConfig};
pub use context::{HookContext, Params, Phase, Principal};
pub use defaults::{DefaultDeclaration, DefaultProvider, DefaultRule, DefaultsInjector};
pub use engine::{CompiledSchema, JsonSchemaEngine, SchemaEngine};
pub use error::{HookError, Violation};
pub use pipeline::{Hook, ValidateAndSetDefaults, schema_validator, set_defaults, validate_schema_and_set_defaults};
pub use registry::{DeclarationClient, RegistryStore, RuleKey, SchemaDeclaration};
pub use resolver::SchemaResolver;
pub use rule::{Rule, SchemaRule, Selector};
pub use trusted::{NeverTrusted, ProviderAbsent, TrustedSource};
pub use validator::SchemaValidator;
