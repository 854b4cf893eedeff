//! Interpreter-level scenarios: raw bytecode driven through the full VM
//! against an in-memory state store.

use fugue_evm::{
    ChainConfig, Config, Context, Evm, EvmError, ExecutionResult, MemoryStateStore, StateStore,
};
use fugue_primitives::{Address, H256, U256};

const GAS: u64 = 1_000_000;

fn caller() -> Address {
    Address::from_bytes([0xCA; 20])
}

fn target() -> Address {
    Address::from_bytes([0x0A; 20])
}

fn run_code_at(
    code: &[u8],
    gas: u64,
    chain: ChainConfig,
) -> (ExecutionResult, MemoryStateStore) {
    let mut state = MemoryStateStore::new();
    state.create_account(target());
    state.set_code(target(), code.to_vec());
    let mut evm = Evm::new(Context::default(), &mut state, chain, Config::default());
    let result = evm.call(caller(), target(), &[], gas, U256::zero());
    drop(evm);
    (result, state)
}

fn run_code(code: &[u8], gas: u64) -> (ExecutionResult, MemoryStateStore) {
    run_code_at(code, gas, ChainConfig::byzantium())
}

fn output_word(result: &ExecutionResult) -> U256 {
    assert_eq!(result.output.len(), 32, "expected a 32-byte output");
    U256::from_big_endian(&result.output)
}

// ---------------------------------------------------------------------------
// Concrete scenarios

#[test]
fn add_two_constants_and_return() {
    // PUSH1 5; PUSH1 3; ADD; PUSH1 0; MSTORE; PUSH1 32; PUSH1 0; RETURN
    let code = hex::decode("600560030160005260206000f3").unwrap();
    let (result, _) = run_code(&code, GAS);
    assert!(result.is_success());
    assert_eq!(output_word(&result), U256::from(8u64));
    // 7 opcodes at 3 gas plus one word of memory expansion
    assert_eq!(result.gas_left, GAS - 24);
}

#[test]
fn division_by_zero_yields_zero() {
    // PUSH1 0; PUSH1 10; DIV; STOP
    let code = hex::decode("6000600a0400").unwrap();
    let (result, _) = run_code(&code, GAS);
    assert!(result.is_success());
    assert!(result.output.is_empty());
    assert_eq!(result.gas_left, GAS - 11);
}

#[test]
fn jump_to_valid_jumpdest() {
    // PUSH1 3; JUMP; JUMPDEST; STOP
    let code = hex::decode("6003565b00").unwrap();
    let (result, _) = run_code(&code, GAS);
    assert!(result.is_success());
    assert_eq!(result.gas_left, GAS - 12);
}

#[test]
fn jump_to_invalid_target_consumes_all_gas() {
    // PUSH1 2; JUMP -- position 2 is the JUMP itself, not a JUMPDEST
    let code = hex::decode("6002565b00").unwrap();
    let (result, _) = run_code(&code, GAS);
    assert_eq!(result.error, Some(EvmError::InvalidJump(2)));
    assert_eq!(result.gas_left, 0);
}

#[test]
fn revert_returns_payload_and_remaining_gas() {
    // PUSH1 0x42; PUSH1 0; MSTORE; PUSH1 32; PUSH1 0; REVERT
    let code = hex::decode("604260005260206000fd").unwrap();
    let (result, _) = run_code(&code, GAS);
    assert!(result.is_revert());
    assert_eq!(output_word(&result), U256::from(0x42u64));
    assert_eq!(result.gas_left, GAS - 18);
}

#[test]
fn sstore_then_sload() {
    // PUSH1 7; PUSH1 1; SSTORE; PUSH1 1; SLOAD; PUSH1 0; MSTORE;
    // PUSH1 32; PUSH1 0; RETURN
    let code = hex::decode("600760015560015460005260206000f3").unwrap();
    let (result, state) = run_code(&code, GAS);
    assert!(result.is_success());
    assert_eq!(output_word(&result), U256::from(7u64));
    let slot = H256::from_word(&U256::one());
    assert_eq!(state.storage(target(), slot).to_word(), U256::from(7u64));
    // 6 pushes + 20000 (zero to non-zero) + 200 SLOAD + MSTORE + memory
    assert_eq!(result.gas_left, GAS - 20224);
}

// ---------------------------------------------------------------------------
// Algebraic laws

#[test]
fn push_pop_is_a_state_noop_but_costs_gas() {
    let code = hex::decode("60015000").unwrap();
    let (result, _) = run_code(&code, GAS);
    assert!(result.is_success());
    assert!(result.output.is_empty());
    assert_eq!(result.gas_left, GAS - 5);
}

#[test]
fn dup1_pop_leaves_stack_unchanged() {
    // PUSH1 42; DUP1; POP; PUSH1 0; MSTORE; PUSH1 32; PUSH1 0; RETURN
    let code = hex::decode("602a805060005260206000f3").unwrap();
    let (result, _) = run_code(&code, GAS);
    assert_eq!(output_word(&result), U256::from(42u64));
}

#[test]
fn swap1_twice_is_identity() {
    // PUSH1 1; PUSH1 2; SWAP1; SWAP1; PUSH1 0; MSTORE; ...; RETURN
    let code = hex::decode("60016002909060005260206000f3").unwrap();
    let (result, _) = run_code(&code, GAS);
    assert_eq!(output_word(&result), U256::from(2u64));
}

#[test]
fn signextend_31_is_identity() {
    let mut word = [0u8; 32];
    word[0] = 0x80;
    word[31] = 0x01;
    // PUSH32 word; PUSH1 31; SIGNEXTEND; store and return
    let mut code = vec![0x7F];
    code.extend_from_slice(&word);
    code.extend_from_slice(&hex::decode("601f0b60005260206000f3").unwrap());
    let (result, _) = run_code(&code, GAS);
    assert_eq!(result.output, word);
}

#[test]
fn signextend_extends_the_sign_bit() {
    // PUSH1 0xFF; PUSH1 0; SIGNEXTEND => all ones
    let code = hex::decode("60ff60000b60005260206000f3").unwrap();
    let (result, _) = run_code(&code, GAS);
    assert_eq!(output_word(&result), U256::MAX);
}

#[test]
fn byte_extracts_big_endian_positions() {
    // PUSH1 0xAB; PUSH1 31; BYTE => 0xAB (lowest byte)
    let code = hex::decode("60ab601f1a60005260206000f3").unwrap();
    let (result, _) = run_code(&code, GAS);
    assert_eq!(output_word(&result), U256::from(0xABu64));

    // PUSH1 0xAB; PUSH1 32; BYTE => 0 (out of range)
    let code = hex::decode("60ab60201a60005260206000f3").unwrap();
    let (result, _) = run_code(&code, GAS);
    assert!(output_word(&result).is_zero());
}

#[test]
fn exp_value_and_byte_cost() {
    // PUSH1 2 (exponent); PUSH1 3 (base); EXP => 9
    let code = hex::decode("600260030a60005260206000f3").unwrap();
    let (result, _) = run_code(&code, GAS);
    assert_eq!(output_word(&result), U256::from(9u64));
    // 5 pushes + EXP (10 + 50 for one exponent byte) + MSTORE + memory
    assert_eq!(result.gas_left, GAS - (15 + 60 + 3 + 3));
}

#[test]
fn exp_byte_cost_is_cheaper_before_eip158() {
    let code = hex::decode("600260030a00").unwrap();
    let (result, _) = run_code_at(&code, GAS, ChainConfig::homestead());
    assert!(result.is_success());
    // 2 pushes + EXP (10 + 10 per exponent byte pre-EIP-160)
    assert_eq!(result.gas_left, GAS - (6 + 20));
}

// ---------------------------------------------------------------------------
// Failure modes

#[test]
fn out_of_gas_consumes_everything() {
    let code = hex::decode("6001").unwrap();
    let (result, _) = run_code(&code, 2);
    assert_eq!(result.error, Some(EvmError::OutOfGas));
    assert_eq!(result.gas_left, 0);
}

#[test]
fn stack_underflow() {
    let code = hex::decode("50").unwrap();
    let (result, _) = run_code(&code, GAS);
    assert_eq!(result.error, Some(EvmError::StackUnderflow));
    assert_eq!(result.gas_left, 0);
}

#[test]
fn stack_overflow_at_1025_items() {
    let mut code = Vec::new();
    for _ in 0..1025 {
        code.extend_from_slice(&[0x60, 0x01]);
    }
    let (result, _) = run_code(&code, GAS);
    assert_eq!(result.error, Some(EvmError::StackOverflow));
    assert_eq!(result.gas_left, 0);
}

#[test]
fn invalid_opcode_consumes_all_gas() {
    for code in [&[0xFEu8][..], &[0x0C][..], &[0x21][..]] {
        let (result, _) = run_code(code, GAS);
        assert_eq!(result.error, Some(EvmError::InvalidOpcode(code[0])));
        assert_eq!(result.gas_left, 0);
    }
}

#[test]
fn jump_into_push_immediate_is_invalid() {
    // PUSH1 1; JUMP -- position 1 is the 0x5B-looking immediate? No:
    // here position 1 holds 0x01; the point is any non-JUMPDEST target.
    let code = hex::decode("600156").unwrap();
    let (result, _) = run_code(&code, GAS);
    assert!(matches!(result.error, Some(EvmError::InvalidJump(_))));

    // A JUMPDEST byte hidden inside a PUSH immediate is not a target:
    // PUSH1 4; JUMP; PUSH1 0x5B; STOP -- position 4 holds 0x5B but is
    // immediate data.
    let code = hex::decode("600456605b00").unwrap();
    let (result, _) = run_code(&code, GAS);
    assert_eq!(result.error, Some(EvmError::InvalidJump(4)));
}

#[test]
fn falling_off_the_end_halts_normally() {
    let code = hex::decode("6001").unwrap();
    let (result, _) = run_code(&code, GAS);
    assert!(result.is_success());
    assert_eq!(result.gas_left, GAS - 3);
}

// ---------------------------------------------------------------------------
// Fork gating

#[test]
fn revert_is_invalid_before_byzantium() {
    let code = hex::decode("604260005260206000fd").unwrap();
    let (result, _) = run_code_at(&code, GAS, ChainConfig::homestead());
    assert_eq!(result.error, Some(EvmError::InvalidOpcode(0xFD)));
    assert_eq!(result.gas_left, 0);
}

#[test]
fn returndatasize_is_invalid_before_byzantium() {
    let code = hex::decode("3d00").unwrap();
    let (result, _) = run_code_at(&code, GAS, ChainConfig::homestead());
    assert_eq!(result.error, Some(EvmError::InvalidOpcode(0x3D)));
}

#[test]
fn delegatecall_is_invalid_before_homestead() {
    // Dispatch validity is checked before operands, so the bare opcode
    // byte is enough to probe the table.
    let (result, _) = run_code_at(&[0xF4], GAS, ChainConfig::frontier());
    assert_eq!(result.error, Some(EvmError::InvalidOpcode(0xF4)));

    let (result, _) = run_code_at(&[0xFA], GAS, ChainConfig::homestead());
    assert_eq!(result.error, Some(EvmError::InvalidOpcode(0xFA)));
}

#[test]
fn sload_costs_50_before_eip150() {
    // PUSH1 0; SLOAD; STOP
    let code = hex::decode("60005400").unwrap();
    let (result, _) = run_code_at(&code, GAS, ChainConfig::homestead());
    assert_eq!(result.gas_left, GAS - 53);
    let (result, _) = run_code(&code, GAS);
    assert_eq!(result.gas_left, GAS - 203);
}

// ---------------------------------------------------------------------------
// Environment opcodes

#[test]
fn blockhash_window_is_256_blocks() {
    let mut hashes = std::collections::HashMap::new();
    hashes.insert(299u64, H256::from_bytes([0xBB; 32]));
    hashes.insert(44u64, H256::from_bytes([0xCC; 32]));

    let run = |code: &[u8]| {
        let mut state = MemoryStateStore::new();
        state.create_account(target());
        state.set_code(target(), code.to_vec());
        let hashes = hashes.clone();
        let context = Context {
            block_number: 300,
            get_hash: Box::new(move |n| hashes.get(&n).copied().unwrap_or(H256::ZERO)),
            ..Context::default()
        };
        let mut evm = Evm::new(
            context,
            &mut state,
            ChainConfig::byzantium(),
            Config::default(),
        );
        evm.call(caller(), target(), &[], GAS, U256::zero())
    };

    // PUSH2 299; BLOCKHASH; store; return
    let result = run(&hex::decode("61012b4060005260206000f3").unwrap());
    assert_eq!(result.output, [0xBB; 32]);

    // Block 44 is 256 back from 300: still visible.
    let result = run(&hex::decode("602c4060005260206000f3").unwrap());
    assert_eq!(result.output, [0xCC; 32]);

    // Block 43 is 257 back: out of the window.
    let result = run(&hex::decode("602b4060005260206000f3").unwrap());
    assert!(output_word(&result).is_zero());

    // The current block has no hash yet.
    let result = run(&hex::decode("61012c4060005260206000f3").unwrap());
    assert!(output_word(&result).is_zero());
}

#[test]
fn caller_and_address_opcodes() {
    // CALLER; PUSH1 0; MSTORE; PUSH1 32; PUSH1 0; RETURN
    let code = hex::decode("3360005260206000f3").unwrap();
    let (result, _) = run_code(&code, GAS);
    let mut expected = [0u8; 32];
    expected[12..].copy_from_slice(caller().as_bytes());
    assert_eq!(result.output, expected);

    // ADDRESS; ...
    let code = hex::decode("3060005260206000f3").unwrap();
    let (result, _) = run_code(&code, GAS);
    let mut expected = [0u8; 32];
    expected[12..].copy_from_slice(target().as_bytes());
    assert_eq!(result.output, expected);
}

#[test]
fn calldata_opcodes_zero_pad() {
    // CALLDATASIZE; PUSH1 0; MSTORE; PUSH1 32; PUSH1 0; RETURN
    let code = hex::decode("3660005260206000f3").unwrap();
    let mut state = MemoryStateStore::new();
    state.create_account(target());
    state.set_code(target(), code);
    let mut evm = Evm::new(
        Context::default(),
        &mut state,
        ChainConfig::byzantium(),
        Config::default(),
    );
    let result = evm.call(caller(), target(), &[1, 2, 3], GAS, U256::zero());
    assert_eq!(output_word(&result), U256::from(3u64));

    // PUSH1 0; CALLDATALOAD reads the three bytes left-aligned
    let code = hex::decode("60003560005260206000f3").unwrap();
    let mut state = MemoryStateStore::new();
    state.create_account(target());
    state.set_code(target(), code);
    let mut evm = Evm::new(
        Context::default(),
        &mut state,
        ChainConfig::byzantium(),
        Config::default(),
    );
    let result = evm.call(caller(), target(), &[1, 2, 3], GAS, U256::zero());
    let mut expected = [0u8; 32];
    expected[..3].copy_from_slice(&[1, 2, 3]);
    assert_eq!(result.output, expected);
}

#[test]
fn truncated_push_reads_as_zero_extended() {
    // PUSH2 with one immediate byte left in the code
    let code = hex::decode("61ff").unwrap();
    let (result, _) = run_code(&code, GAS);
    assert!(result.is_success());

    // Observable through MSIZE-free return: PUSH3 ab; RETURN of it
    let code = hex::decode("62abcd").unwrap();
    let (result, _) = run_code(&code, GAS);
    assert!(result.is_success());
}

#[test]
fn msize_tracks_word_aligned_high_water_mark() {
    // PUSH1 1; PUSH1 33; MSTORE8; MSIZE; PUSH1 0; MSTORE; return
    let code = hex::decode("60016021535960005260206000f3").unwrap();
    let (result, _) = run_code(&code, GAS);
    assert_eq!(output_word(&result), U256::from(64u64));
}

#[test]
fn logs_are_recorded_with_topics() {
    // PUSH1 0xAA (topic); PUSH1 2 (size); PUSH1 0 (offset); LOG1
    let code = hex::decode("60aa60026000a100").unwrap();
    let (result, state) = run_code(&code, GAS);
    assert!(result.is_success());
    let logs = state.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].address, target());
    assert_eq!(logs[0].topics, vec![H256::from_word(&U256::from(0xAAu64))]);
    assert_eq!(logs[0].data, vec![0, 0]);
    // 3 pushes + log base + one topic + 2 data bytes + memory word
    assert_eq!(result.gas_left, GAS - (9 + 375 + 375 + 16 + 3));
}

#[test]
fn cancelled_vm_aborts_with_consume_all() {
    let code = hex::decode("6001600101").unwrap();
    let mut state = MemoryStateStore::new();
    state.create_account(target());
    state.set_code(target(), code);
    let mut evm = Evm::new(
        Context::default(),
        &mut state,
        ChainConfig::byzantium(),
        Config::default(),
    );
    evm.cancel_token().cancel();
    let result = evm.call(caller(), target(), &[], GAS, U256::zero());
    assert_eq!(result.error, Some(EvmError::Aborted));
    assert_eq!(result.gas_left, 0);
}
