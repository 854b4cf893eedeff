//! Drive the bundled fixture files through the runner at the Byzantium
//! rule set.

use fugue_evm::ChainConfig;
use fugue_evm_tests::VmTestRunner;

fn run_fixture(name: &str, content: &str) {
    let runner = VmTestRunner::new(ChainConfig::byzantium(), false);
    let results = runner.run_json(name, content).unwrap();
    assert!(
        results.all_passed(),
        "{} failed cases: {:?}",
        name,
        results.failed
    );
    assert!(results.total() > 0);
}

#[test]
fn arithmetic_fixtures() {
    run_fixture(
        "vm_arithmetic.json",
        include_str!("fixtures/vm_arithmetic.json"),
    );
}

#[test]
fn flow_fixtures() {
    run_fixture("vm_flow.json", include_str!("fixtures/vm_flow.json"));
}

#[test]
fn storage_fixtures() {
    run_fixture("vm_storage.json", include_str!("fixtures/vm_storage.json"));
}

#[test]
fn storage_fixture_fails_at_the_wrong_fork() {
    // SLOAD costs 50 before EIP-150, so the Byzantium gas expectations
    // cannot hold under Homestead rules.
    let runner = VmTestRunner::new(ChainConfig::homestead(), false);
    let results = runner
        .run_json("vm_storage.json", include_str!("fixtures/vm_storage.json"))
        .unwrap();
    assert!(!results.all_passed());
}
