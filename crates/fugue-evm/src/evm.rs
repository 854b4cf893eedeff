//! Call-frame orchestration

use crate::contract::Contract;
use crate::error::{EvmError, ExecutionResult};
use crate::gas::{cost, GasTable};
use crate::interpreter::{self, Interpreter};
use crate::jumpdest::JumpdestCache;
use crate::jumptable::{new_jump_table, JumpTable};
use crate::precompile::{run_precompile, PrecompileRegistry};
use crate::rules::{ChainConfig, Rules};
use crate::state::StateStore;
use crate::tracer::Tracer;
use fugue_crypto::{create_address, empty_code_hash, keccak256};
use fugue_primitives::{Address, H256, U256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// Balance check used by the default [`Context`]
pub fn can_transfer<S: StateStore>(state: &S, from: Address, amount: U256) -> bool {
    state.balance(from) >= amount
}

/// Balance movement used by the default [`Context`]
pub fn transfer<S: StateStore>(state: &mut S, from: Address, to: Address, amount: U256) {
    state.sub_balance(from, amount);
    state.add_balance(to, amount);
}

/// Predicate deciding whether `from` can part with `amount`
pub type CanTransferFn<S> = fn(&S, Address, U256) -> bool;
/// Moves `amount` between two accounts
pub type TransferFn<S> = fn(&mut S, Address, Address, U256);
/// Block-hash lookup backing the BLOCKHASH opcode
pub type GetHashFn = Box<dyn Fn(u64) -> H256>;

/// Block and transaction environment the VM executes in. Provided once
/// per transaction and never modified.
pub struct Context<S: StateStore> {
    /// Whether the account can afford a transfer
    pub can_transfer: CanTransferFn<S>,
    /// Performs a balance transfer
    pub transfer: TransferFn<S>,
    /// Hash of the nth block, for BLOCKHASH
    pub get_hash: GetHashFn,

    /// Transaction origin (ORIGIN)
    pub origin: Address,
    /// Transaction gas price (GASPRICE)
    pub gas_price: U256,

    /// Block beneficiary (COINBASE)
    pub coinbase: Address,
    /// Block gas limit (GASLIMIT)
    pub gas_limit: u64,
    /// Block height (NUMBER, fork selection)
    pub block_number: u64,
    /// Block timestamp (TIMESTAMP)
    pub time: u64,
    /// Block difficulty (DIFFICULTY)
    pub difficulty: U256,
}

impl<S: StateStore> Default for Context<S> {
    fn default() -> Self {
        Self {
            can_transfer,
            transfer,
            get_hash: Box::new(|_| H256::ZERO),
            origin: Address::ZERO,
            gas_price: U256::zero(),
            coinbase: Address::ZERO,
            gas_limit: 0,
            block_number: 0,
            time: 0,
            difficulty: U256::zero(),
        }
    }
}

/// VM behavior switches
#[derive(Default)]
pub struct Config {
    /// Feed the tracer with per-step and per-frame events
    pub debug: bool,
    /// Observer receiving events when `debug` is set
    pub tracer: Option<Box<dyn Tracer>>,
    /// Refuse to execute nested frames
    pub no_recursion: bool,
    /// Record SHA3 preimages into the state store
    pub enable_preimage_recording: bool,
    /// Replace the rule-derived precompile set
    pub precompiles: Option<PrecompileRegistry>,
}

/// Handle for cancelling a running VM from another thread
#[derive(Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Set the abort flag; the interpreter halts at the next opcode
    /// boundary with a consume-all `Aborted` failure.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// The virtual machine.
///
/// One instance executes one top-level call or create and must not be
/// reused afterwards. Any failure a frame reports is a
/// revert-state-and-consume-all-gas event except for the explicit
/// `Revert`, which hands the remaining gas back. The instance is not
/// thread-safe; only the [`CancelToken`] may be touched concurrently.
pub struct Evm<'a, S: StateStore> {
    /// Execution environment
    pub context: Context<S>,
    /// Account state the frames run against
    pub state: &'a mut S,
    chain_config: ChainConfig,
    pub(crate) rules: Rules,
    pub(crate) config: Config,
    pub(crate) gas_table: GasTable,
    pub(crate) table: Box<JumpTable<S>>,
    pub(crate) interpreter: Interpreter,
    pub(crate) jumpdests: JumpdestCache,
    pub(crate) precompiles: PrecompileRegistry,
    pub(crate) depth: usize,
    pub(crate) call_gas_temp: u64,
    abort: Arc<AtomicBool>,
}

impl<'a, S: StateStore> Evm<'a, S> {
    /// Build a VM for one transaction. Fork rules, the gas table, the
    /// opcode table and the precompile set are all fixed here from the
    /// context's block number.
    pub fn new(
        context: Context<S>,
        state: &'a mut S,
        chain_config: ChainConfig,
        mut config: Config,
    ) -> Self {
        let rules = chain_config.rules(context.block_number);
        let gas_table = GasTable::for_rules(&rules);
        let table = Box::new(new_jump_table(&rules, &gas_table));
        let precompiles = config
            .precompiles
            .take()
            .unwrap_or_else(|| PrecompileRegistry::for_rules(&rules));
        Self {
            context,
            state,
            chain_config,
            rules,
            config,
            gas_table,
            table,
            interpreter: Interpreter::default(),
            jumpdests: JumpdestCache::new(),
            precompiles,
            depth: 0,
            call_gas_temp: 0,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Chain configuration the VM was built with
    pub fn chain_config(&self) -> &ChainConfig {
        &self.chain_config
    }

    /// Fork flags active for this transaction
    pub fn rules(&self) -> Rules {
        self.rules
    }

    /// Set the abort flag. Safe to call repeatedly.
    pub fn cancel(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    /// Handle for cancelling from another thread
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken(self.abort.clone())
    }

    pub(crate) fn aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    pub(crate) fn valid_jumpdest(&mut self, contract: &Contract, dest: &U256) -> bool {
        self.jumpdests
            .has(&contract.code_hash, &contract.code, dest)
    }

    /// Run a frame, short-circuiting through a precompile when one is
    /// registered at the frame's code address.
    fn run(&mut self, contract: &mut Contract, input: &[u8]) -> Result<Vec<u8>, EvmError> {
        if let Some(code_address) = contract.code_address {
            if let Some(precompile) = self.precompiles.get(&code_address) {
                return run_precompile(precompile, input, contract);
            }
        }
        interpreter::run(self, contract, input)
    }

    /// Execute the code at `addr` with the given input, transferring
    /// `value` from `caller` first.
    pub fn call(
        &mut self,
        caller: Address,
        addr: Address,
        input: &[u8],
        gas: u64,
        value: U256,
    ) -> ExecutionResult {
        if self.config.no_recursion && self.depth > 0 {
            return ExecutionResult::success(Vec::new(), gas);
        }
        if self.depth > cost::MAX_CALL_DEPTH {
            return ExecutionResult::failure(EvmError::Depth, gas);
        }
        if !(self.context.can_transfer)(&*self.state, caller, value) {
            return ExecutionResult::failure(EvmError::InsufficientBalance, gas);
        }
        trace!(depth = self.depth, %caller, to = %addr, gas, "call");

        let snapshot = self.state.snapshot();
        if !self.state.exists(addr) {
            // Calls into thin air stay side-effect free once the empty
            // account rule is active.
            if !self.precompiles.contains(&addr) && self.rules.is_eip158 && value.is_zero() {
                return ExecutionResult::success(Vec::new(), gas);
            }
            self.state.create_account(addr);
        }
        (self.context.transfer)(&mut *self.state, caller, addr, value);

        let mut contract = Contract::new(caller, addr, value, gas);
        contract.set_call_code(addr, self.state.code_hash(addr), self.state.code(addr));

        let start = Instant::now();
        if self.config.debug && self.depth == 0 {
            if let Some(tracer) = self.config.tracer.as_mut() {
                tracer.capture_start(caller, addr, false, input, gas, value);
            }
        }

        let (output, error) = match self.run(&mut contract, input) {
            Ok(ret) => (ret, None),
            Err(err) => {
                self.state.revert_to(snapshot);
                if let EvmError::Revert(data) = &err {
                    (data.clone(), Some(err))
                } else {
                    contract.gas = 0;
                    (Vec::new(), Some(err))
                }
            }
        };

        if self.config.debug && self.depth == 0 {
            let gas_used = gas - contract.gas;
            if let Some(tracer) = self.config.tracer.as_mut() {
                tracer.capture_end(&output, gas_used, start.elapsed(), error.as_ref());
            }
        }
        ExecutionResult {
            output,
            gas_left: contract.gas,
            error,
        }
    }

    /// Execute the code at `addr` against the caller's own storage and
    /// balance (the frame's self address stays the caller).
    pub fn call_code(
        &mut self,
        caller: Address,
        addr: Address,
        input: &[u8],
        gas: u64,
        value: U256,
    ) -> ExecutionResult {
        if self.config.no_recursion && self.depth > 0 {
            return ExecutionResult::success(Vec::new(), gas);
        }
        if self.depth > cost::MAX_CALL_DEPTH {
            return ExecutionResult::failure(EvmError::Depth, gas);
        }
        if !(self.context.can_transfer)(&*self.state, caller, value) {
            return ExecutionResult::failure(EvmError::InsufficientBalance, gas);
        }
        trace!(depth = self.depth, %caller, code = %addr, gas, "callcode");

        let snapshot = self.state.snapshot();
        let mut contract = Contract::new(caller, caller, value, gas);
        contract.set_call_code(addr, self.state.code_hash(addr), self.state.code(addr));

        let (output, error) = match self.run(&mut contract, input) {
            Ok(ret) => (ret, None),
            Err(err) => {
                self.state.revert_to(snapshot);
                if let EvmError::Revert(data) = &err {
                    (data.clone(), Some(err))
                } else {
                    contract.gas = 0;
                    (Vec::new(), Some(err))
                }
            }
        };
        ExecutionResult {
            output,
            gas_left: contract.gas,
            error,
        }
    }

    /// Execute the code at `addr` fully in the parent frame's context:
    /// same storage target, same caller identity, same value.
    pub fn delegate_call(
        &mut self,
        parent: &Contract,
        addr: Address,
        input: &[u8],
        gas: u64,
    ) -> ExecutionResult {
        if self.config.no_recursion && self.depth > 0 {
            return ExecutionResult::success(Vec::new(), gas);
        }
        if self.depth > cost::MAX_CALL_DEPTH {
            return ExecutionResult::failure(EvmError::Depth, gas);
        }
        trace!(depth = self.depth, caller = %parent.address, code = %addr, gas, "delegatecall");

        let snapshot = self.state.snapshot();
        let mut contract =
            Contract::new(parent.address, parent.address, U256::zero(), gas).as_delegate(parent);
        contract.set_call_code(addr, self.state.code_hash(addr), self.state.code(addr));

        let (output, error) = match self.run(&mut contract, input) {
            Ok(ret) => (ret, None),
            Err(err) => {
                self.state.revert_to(snapshot);
                if let EvmError::Revert(data) = &err {
                    (data.clone(), Some(err))
                } else {
                    contract.gas = 0;
                    (Vec::new(), Some(err))
                }
            }
        };
        ExecutionResult {
            output,
            gas_left: contract.gas,
            error,
        }
    }

    /// Execute the code at `addr` with state modifications disallowed
    /// for the whole subtree.
    pub fn static_call(
        &mut self,
        caller: Address,
        addr: Address,
        input: &[u8],
        gas: u64,
    ) -> ExecutionResult {
        if self.config.no_recursion && self.depth > 0 {
            return ExecutionResult::success(Vec::new(), gas);
        }
        if self.depth > cost::MAX_CALL_DEPTH {
            return ExecutionResult::failure(EvmError::Depth, gas);
        }
        trace!(depth = self.depth, %caller, to = %addr, gas, "staticcall");

        // The flag stays up for nested frames and is only dropped by the
        // frame that raised it.
        let restore = !self.interpreter.read_only;
        if restore {
            self.interpreter.read_only = true;
        }

        let snapshot = self.state.snapshot();
        let mut contract = Contract::new(caller, addr, U256::zero(), gas);
        contract.set_call_code(addr, self.state.code_hash(addr), self.state.code(addr));

        let (output, error) = match self.run(&mut contract, input) {
            Ok(ret) => (ret, None),
            Err(err) => {
                self.state.revert_to(snapshot);
                if let EvmError::Revert(data) = &err {
                    (data.clone(), Some(err))
                } else {
                    contract.gas = 0;
                    (Vec::new(), Some(err))
                }
            }
        };

        if restore {
            self.interpreter.read_only = false;
        }
        ExecutionResult {
            output,
            gas_left: contract.gas,
            error,
        }
    }

    /// Deploy a contract: run `code` as an initialization frame and
    /// install its return value as the account code. Returns the outcome
    /// together with the derived address.
    pub fn create(
        &mut self,
        caller: Address,
        code: &[u8],
        gas: u64,
        value: U256,
    ) -> (ExecutionResult, Address) {
        if self.depth > cost::MAX_CALL_DEPTH {
            return (
                ExecutionResult::failure(EvmError::Depth, gas),
                Address::ZERO,
            );
        }
        if !(self.context.can_transfer)(&*self.state, caller, value) {
            return (
                ExecutionResult::failure(EvmError::InsufficientBalance, gas),
                Address::ZERO,
            );
        }

        let nonce = self.state.nonce(caller);
        self.state.set_nonce(caller, nonce + 1);

        let address = create_address(&caller, nonce);
        let contract_hash = self.state.code_hash(address);
        if self.state.nonce(address) != 0
            || (!contract_hash.is_zero() && contract_hash != empty_code_hash())
        {
            return (
                ExecutionResult::failure(EvmError::ContractAddressCollision, 0),
                Address::ZERO,
            );
        }
        trace!(depth = self.depth, %caller, created = %address, gas, "create");

        let snapshot = self.state.snapshot();
        self.state.create_account(address);
        if self.rules.is_eip158 {
            self.state.set_nonce(address, 1);
        }
        (self.context.transfer)(&mut *self.state, caller, address, value);

        let mut contract = Contract::new(caller, address, value, gas);
        contract.set_call_code(address, keccak256(code), code.to_vec());

        if self.config.no_recursion && self.depth > 0 {
            return (ExecutionResult::success(Vec::new(), gas), address);
        }

        let start = Instant::now();
        if self.config.debug && self.depth == 0 {
            if let Some(tracer) = self.config.tracer.as_mut() {
                tracer.capture_start(caller, address, true, code, gas, value);
            }
        }

        let (output, mut error) = match self.run(&mut contract, &[]) {
            Ok(ret) => (ret, None),
            Err(err) => {
                if let EvmError::Revert(data) = &err {
                    (data.clone(), Some(err))
                } else {
                    (Vec::new(), Some(err))
                }
            }
        };

        let max_code_size_exceeded =
            self.rules.is_eip158 && output.len() > cost::MAX_CODE_SIZE;

        // Pay for storing the returned code; running out here becomes a
        // plain failure from Homestead on.
        if error.is_none() && !max_code_size_exceeded {
            let create_data_gas = output.len() as u64 * cost::CREATE_DATA;
            if contract.use_gas(create_data_gas) {
                self.state.set_code(address, output.clone());
            } else {
                error = Some(EvmError::CodeStoreOutOfGas);
            }
        }

        let revert_needed = max_code_size_exceeded
            || match &error {
                Some(EvmError::CodeStoreOutOfGas) => self.rules.is_homestead,
                Some(_) => true,
                None => false,
            };
        if revert_needed {
            self.state.revert_to(snapshot);
            if !matches!(error, Some(EvmError::Revert(_))) {
                contract.gas = 0;
            }
        }
        if max_code_size_exceeded && error.is_none() {
            error = Some(EvmError::MaxCodeSizeExceeded);
        }

        if self.config.debug && self.depth == 0 {
            let gas_used = gas - contract.gas;
            if let Some(tracer) = self.config.tracer.as_mut() {
                tracer.capture_end(&output, gas_used, start.elapsed(), error.as_ref());
            }
        }
        (
            ExecutionResult {
                output,
                gas_left: contract.gas,
                error,
            },
            address,
        )
    }
}
