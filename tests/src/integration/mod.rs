//! Cross-crate integration tests.

pub mod concurrency;
pub mod flows;

use at_02_lifecycle::TraceContext;
use shared_types::{Profile, ProfileId, Role};

/// A wired context plus one profile of each role.
pub struct Fixture {
    pub ctx: TraceContext,
    pub farmer: ProfileId,
    pub distributor: ProfileId,
    pub buyer: ProfileId,
}

/// Wire a fresh context and seed the three roles.
#[must_use]
pub fn fixture() -> Fixture {
    // Quiet by default; RUST_LOG enables output when debugging a test.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let ctx = TraceContext::new();
    let farmer = ProfileId::new();
    let distributor = ProfileId::new();
    let buyer = ProfileId::new();

    ctx.directory().register(Profile {
        id: farmer,
        role: Role::Farmer,
        display_name: "Ana Reyes".into(),
    });
    ctx.directory().register(Profile {
        id: distributor,
        role: Role::Distributor,
        display_name: "Haulage Co".into(),
    });
    ctx.directory().register(Profile {
        id: buyer,
        role: Role::Buyer,
        display_name: "Mill Ltd".into(),
    });

    Fixture {
        ctx,
        farmer,
        distributor,
        buyer,
    }
}
