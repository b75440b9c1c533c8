/*! Integration tests for Accord.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - builder: Mutation sessions and the requests they produce
 * - patch: Materializing engine patches into snapshots
 * - document: The Document facade, merging and forking
 * - table: Typed table views and row mutations
 * - counter: Counter increments and their convergence
 * - sync: The peer sync protocol end to end
 * - engine: The in-memory engine contract
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("accord=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod builder;
mod counter;
mod document;
mod engine;
mod helpers;
mod patch;
mod table;
