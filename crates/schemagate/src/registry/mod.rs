// Schema Registry Module
//
// Holds the rules declared for each resource, flattened under the composite
// key resource:phase:method:role. Rules are stored as declared; dynamic rules
// are resolved per invocation by the resolver.

mod client;
mod declaration;
mod store;

pub use client::DeclarationClient;
pub use declaration::{DeclaredRule, SchemaDeclaration};
pub use store::{RegistryStore, RuleKey, SchemaRegistry};
