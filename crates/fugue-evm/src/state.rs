//! Account state abstraction and an in-memory implementation

use crate::error::Log;
use fugue_crypto::keccak256;
use fugue_primitives::{Address, H256, U256};
use std::collections::{HashMap, HashSet};

/// The account-state capability set the VM executes against.
///
/// The VM never persists anything itself; every observable effect of a
/// transaction flows through this trait. Snapshot identifiers are opaque
/// and strictly LIFO: a frame must never revert past a snapshot taken by
/// an ancestor.
pub trait StateStore {
    /// Create an account, replacing any existing object at the address
    fn create_account(&mut self, address: Address);
    /// Whether an account object exists
    fn exists(&self, address: Address) -> bool;
    /// Whether the account is empty: zero nonce, zero balance, no code
    fn is_empty(&self, address: Address) -> bool;

    /// Account balance
    fn balance(&self, address: Address) -> U256;
    /// Credit the account
    fn add_balance(&mut self, address: Address, amount: U256);
    /// Debit the account
    fn sub_balance(&mut self, address: Address, amount: U256);

    /// Account nonce
    fn nonce(&self, address: Address) -> u64;
    /// Set the account nonce
    fn set_nonce(&mut self, address: Address, nonce: u64);

    /// Account code
    fn code(&self, address: Address) -> Vec<u8>;
    /// Keccak-256 of the account code; zero for nonexistent accounts
    fn code_hash(&self, address: Address) -> H256;
    /// Length of the account code in bytes
    fn code_size(&self, address: Address) -> usize;
    /// Install code on the account
    fn set_code(&mut self, address: Address, code: Vec<u8>);

    /// Read a storage slot
    fn storage(&self, address: Address, key: H256) -> H256;
    /// Write a storage slot
    fn set_storage(&mut self, address: Address, key: H256, value: H256);

    /// Accumulate a gas refund (SSTORE clears, SELFDESTRUCT)
    fn add_refund(&mut self, gas: u64);
    /// Refund accumulated so far
    fn refund(&self) -> u64;

    /// Append a log record
    fn append_log(&mut self, log: Log);

    /// Mark the account for deletion at the end of the transaction and
    /// zero its balance. Returns whether the account existed.
    fn suicide(&mut self, address: Address) -> bool;
    /// Whether the account is already marked for deletion
    fn has_suicided(&self, address: Address) -> bool;

    /// Record a hash preimage (enabled by VM config)
    fn add_preimage(&mut self, hash: H256, preimage: Vec<u8>);

    /// Take a snapshot of the current observable state
    fn snapshot(&mut self) -> usize;
    /// Revert to a snapshot taken earlier in this transaction
    fn revert_to(&mut self, snapshot: usize);
}

#[derive(Debug, Clone, Default)]
struct Account {
    balance: U256,
    nonce: u64,
    code: Vec<u8>,
    storage: HashMap<H256, H256>,
}

#[derive(Debug, Clone)]
struct Snapshot {
    accounts: HashMap<Address, Account>,
    suicided: HashSet<Address>,
    refund: u64,
    logs_len: usize,
}

/// In-memory [`StateStore`] backed by a plain account map.
///
/// Snapshots clone the account map, which is fine for tests and one-off
/// hosts; a production node would journal instead.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    accounts: HashMap<Address, Account>,
    suicided: HashSet<Address>,
    refund: u64,
    logs: Vec<Log>,
    preimages: HashMap<H256, Vec<u8>>,
    snapshots: Vec<Snapshot>,
}

impl MemoryStateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs appended so far
    pub fn logs(&self) -> &[Log] {
        &self.logs
    }

    /// Accounts marked for deletion
    pub fn suicided(&self) -> impl Iterator<Item = &Address> {
        self.suicided.iter()
    }

    /// Recorded hash preimages
    pub fn preimages(&self) -> &HashMap<H256, Vec<u8>> {
        &self.preimages
    }

    /// Test helper: set an account balance directly
    pub fn set_balance(&mut self, address: Address, balance: U256) {
        self.accounts.entry(address).or_default().balance = balance;
    }
}

impl StateStore for MemoryStateStore {
    fn create_account(&mut self, address: Address) {
        // Balance survives account replacement, as it does across a
        // contract deployment over a previously funded address.
        let balance = self
            .accounts
            .get(&address)
            .map(|a| a.balance)
            .unwrap_or_default();
        self.accounts.insert(
            address,
            Account {
                balance,
                ..Account::default()
            },
        );
    }

    fn exists(&self, address: Address) -> bool {
        self.accounts.contains_key(&address)
    }

    fn is_empty(&self, address: Address) -> bool {
        match self.accounts.get(&address) {
            Some(account) => {
                account.nonce == 0 && account.balance.is_zero() && account.code.is_empty()
            }
            None => true,
        }
    }

    fn balance(&self, address: Address) -> U256 {
        self.accounts
            .get(&address)
            .map(|a| a.balance)
            .unwrap_or_default()
    }

    fn add_balance(&mut self, address: Address, amount: U256) {
        let account = self.accounts.entry(address).or_default();
        account.balance = account.balance.overflowing_add(amount).0;
    }

    fn sub_balance(&mut self, address: Address, amount: U256) {
        let account = self.accounts.entry(address).or_default();
        account.balance = account.balance.saturating_sub(amount);
    }

    fn nonce(&self, address: Address) -> u64 {
        self.accounts.get(&address).map(|a| a.nonce).unwrap_or(0)
    }

    fn set_nonce(&mut self, address: Address, nonce: u64) {
        self.accounts.entry(address).or_default().nonce = nonce;
    }

    fn code(&self, address: Address) -> Vec<u8> {
        self.accounts
            .get(&address)
            .map(|a| a.code.clone())
            .unwrap_or_default()
    }

    fn code_hash(&self, address: Address) -> H256 {
        match self.accounts.get(&address) {
            Some(account) => keccak256(&account.code),
            None => H256::ZERO,
        }
    }

    fn code_size(&self, address: Address) -> usize {
        self.accounts.get(&address).map(|a| a.code.len()).unwrap_or(0)
    }

    fn set_code(&mut self, address: Address, code: Vec<u8>) {
        self.accounts.entry(address).or_default().code = code;
    }

    fn storage(&self, address: Address, key: H256) -> H256 {
        self.accounts
            .get(&address)
            .and_then(|a| a.storage.get(&key))
            .copied()
            .unwrap_or(H256::ZERO)
    }

    fn set_storage(&mut self, address: Address, key: H256, value: H256) {
        self.accounts
            .entry(address)
            .or_default()
            .storage
            .insert(key, value);
    }

    fn add_refund(&mut self, gas: u64) {
        self.refund += gas;
    }

    fn refund(&self) -> u64 {
        self.refund
    }

    fn append_log(&mut self, log: Log) {
        self.logs.push(log);
    }

    fn suicide(&mut self, address: Address) -> bool {
        match self.accounts.get_mut(&address) {
            Some(account) => {
                account.balance = U256::zero();
                self.suicided.insert(address);
                true
            }
            None => false,
        }
    }

    fn has_suicided(&self, address: Address) -> bool {
        self.suicided.contains(&address)
    }

    fn add_preimage(&mut self, hash: H256, preimage: Vec<u8>) {
        self.preimages.entry(hash).or_insert(preimage);
    }

    fn snapshot(&mut self) -> usize {
        let id = self.snapshots.len();
        self.snapshots.push(Snapshot {
            accounts: self.accounts.clone(),
            suicided: self.suicided.clone(),
            refund: self.refund,
            logs_len: self.logs.len(),
        });
        id
    }

    fn revert_to(&mut self, snapshot: usize) {
        if snapshot >= self.snapshots.len() {
            return;
        }
        self.snapshots.truncate(snapshot + 1);
        if let Some(snap) = self.snapshots.pop() {
            self.accounts = snap.accounts;
            self.suicided = snap.suicided;
            self.refund = snap.refund;
            self.logs.truncate(snap.logs_len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    #[test]
    fn test_balance_accounting() {
        let mut state = MemoryStateStore::new();
        state.add_balance(addr(1), U256::from(100u64));
        state.sub_balance(addr(1), U256::from(30u64));
        assert_eq!(state.balance(addr(1)), U256::from(70u64));
        assert_eq!(state.balance(addr(2)), U256::zero());
    }

    #[test]
    fn test_empty_account_definition() {
        let mut state = MemoryStateStore::new();
        assert!(state.is_empty(addr(1)));
        assert!(!state.exists(addr(1)));

        state.create_account(addr(1));
        assert!(state.exists(addr(1)));
        assert!(state.is_empty(addr(1)));

        state.set_nonce(addr(1), 1);
        assert!(!state.is_empty(addr(1)));
    }

    #[test]
    fn test_code_hash() {
        let mut state = MemoryStateStore::new();
        assert!(state.code_hash(addr(1)).is_zero());

        state.create_account(addr(1));
        assert_eq!(state.code_hash(addr(1)), keccak256(&[]));

        state.set_code(addr(1), vec![0x60, 0x00]);
        assert_eq!(state.code_hash(addr(1)), keccak256(&[0x60, 0x00]));
        assert_eq!(state.code_size(addr(1)), 2);
    }

    #[test]
    fn test_storage_defaults_to_zero() {
        let mut state = MemoryStateStore::new();
        let key = H256::from_word(&U256::from(1u64));
        assert!(state.storage(addr(1), key).is_zero());
        state.set_storage(addr(1), key, H256::from_word(&U256::from(7u64)));
        assert_eq!(state.storage(addr(1), key).to_word(), U256::from(7u64));
    }

    #[test]
    fn test_snapshot_revert() {
        let mut state = MemoryStateStore::new();
        state.add_balance(addr(1), U256::from(100u64));

        let snap = state.snapshot();
        state.add_balance(addr(1), U256::from(900u64));
        state.set_storage(addr(1), H256::ZERO, H256::from_word(&U256::one()));
        state.append_log(Log::default());
        state.add_refund(15000);

        state.revert_to(snap);
        assert_eq!(state.balance(addr(1)), U256::from(100u64));
        assert!(state.storage(addr(1), H256::ZERO).is_zero());
        assert!(state.logs().is_empty());
        assert_eq!(state.refund(), 0);
    }

    #[test]
    fn test_nested_snapshots_lifo() {
        let mut state = MemoryStateStore::new();
        let s0 = state.snapshot();
        state.add_balance(addr(1), U256::from(1u64));
        let s1 = state.snapshot();
        state.add_balance(addr(1), U256::from(1u64));

        state.revert_to(s1);
        assert_eq!(state.balance(addr(1)), U256::from(1u64));
        state.revert_to(s0);
        assert_eq!(state.balance(addr(1)), U256::zero());
    }

    #[test]
    fn test_revert_discards_later_snapshots() {
        let mut state = MemoryStateStore::new();
        let s0 = state.snapshot();
        let _s1 = state.snapshot();
        state.revert_to(s0);
        // Taking a fresh snapshot reuses the freed identifier space.
        assert_eq!(state.snapshot(), s0);
    }

    #[test]
    fn test_suicide_zeroes_balance() {
        let mut state = MemoryStateStore::new();
        state.create_account(addr(1));
        state.add_balance(addr(1), U256::from(5u64));
        assert!(state.suicide(addr(1)));
        assert!(state.has_suicided(addr(1)));
        assert!(state.balance(addr(1)).is_zero());
        assert!(!state.suicide(addr(9)));
    }

    #[test]
    fn test_create_account_preserves_balance() {
        let mut state = MemoryStateStore::new();
        state.add_balance(addr(1), U256::from(42u64));
        state.set_nonce(addr(1), 3);
        state.create_account(addr(1));
        assert_eq!(state.balance(addr(1)), U256::from(42u64));
        assert_eq!(state.nonce(addr(1)), 0);
    }
}
