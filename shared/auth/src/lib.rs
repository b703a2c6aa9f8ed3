//! Authentication and session core for the Qtron queue-management
//! platform. Keep the public surface thin and split implementation
//! across sub-modules; the hosted database-and-auth platform sits behind
//! the seams in [`platform`].

mod error;
mod memory;
mod organizations;
mod platform;
mod profile;
mod provision;
mod seed;
mod service;
mod session;
mod supabase;

pub use error::{AuthError, PlatformError};
pub use memory::MemoryPlatform;
pub use organizations::OrganizationResolver;
pub use platform::{AuthEvent, Directory, IdentityProvider, PlatformResult};
pub use profile::ProfileLoader;
pub use provision::{AccountProvisioner, NewAccount};
pub use seed::{DemoAccount, DemoSeeder, SeedReport, DEMO_ACCOUNTS, DEMO_ORGANIZATION};
pub use service::AuthService;
pub use session::{SessionCache, SessionState};
pub use supabase::SupabasePlatform;
