//! A gas-metered register interpreter implementing `jam_stf_core::accumulate::PvmEngine`. The
//! PVM's arithmetic/control-flow semantics are treated as an external contract, specified but
//! not implemented here; this interpreter decodes real instructions well enough to drive gas
//! metering, control flow and `ecalli` dispatch, and implements the accumulation/on-transfer
//! host-call surface against the real state delta.

use jam_stf_core::accumulate::{AccumulationContext, DeferredTransfer, OnTransferContext, PvmEngine, PvmOutcome};
use jam_stf_core::state::service::{PreimageLookupKey, PreimageStatus, ServiceAccount};
use jam_stf_core::types::{Balance, Gas, Hash};

use crate::host::{AccumulateCall, OnTransferCall, ReturnCode};
use crate::isa::{self, InstructionArgs, Opcode};

const NUM_REGISTERS: usize = 13;
/// Register conventionally holding a host call's return value (the return-code table is written
/// in terms of "the result register"; this crate fixes that register at index 7).
const RESULT_REGISTER: usize = 7;
const MAX_MEMORY: usize = 4 * 1024 * 1024;

struct Registers([u64; NUM_REGISTERS]);

impl Registers {
    fn get(&self, idx: u8) -> u64 {
        self.0[idx as usize]
    }
    fn set(&mut self, idx: u8, value: u64) {
        self.0[idx as usize] = value;
    }
}

struct Memory(Vec<u8>);

impl Memory {
    fn read(&self, ptr: u64, len: u64) -> Option<&[u8]> {
        let ptr: usize = ptr.try_into().ok()?;
        let len: usize = len.try_into().ok()?;
        self.0.get(ptr..ptr.checked_add(len)?)
    }

    fn write(&mut self, ptr: u64, data: &[u8]) -> bool {
        let ptr: usize = match ptr.try_into() {
            Ok(p) => p,
            Err(_) => return false,
        };
        let end = match ptr.checked_add(data.len()) {
            Some(e) => e,
            None => return false,
        };
        if end > self.0.len() {
            if end > MAX_MEMORY {
                return false;
            }
            self.0.resize(end, 0);
        }
        self.0[ptr..end].copy_from_slice(data);
        true
    }
}

/// The outcome of running the instruction loop to completion or fault,
/// before host-call dispatch has had a chance to override it with
/// `PvmOutcome::Halt` (a `yield` host call, for instance).
enum StepOutcome {
    Halted,
    Panicked,
    OutOfGas,
    HostCall(i64),
}

struct Interpreter {
    registers: Registers,
    memory: Memory,
    gas: i64,
}

impl Interpreter {
    fn new(gas_limit: Gas, args: &[u8]) -> Self {
        let mut memory = vec![0u8; args.len()];
        memory.copy_from_slice(args);
        Self {
            registers: Registers([0; NUM_REGISTERS]),
            memory: Memory(memory),
            gas: gas_limit as i64,
        }
    }

    /// Runs until a `Trap`, a `Fallthrough` past the end of `code`, an
    /// `ecalli`, or gas exhaustion (whichever comes first).
    fn run_until_host_call_or_halt(&mut self, code: &[u8], pc: &mut usize) -> StepOutcome {
        loop {
            if self.gas <= 0 {
                return StepOutcome::OutOfGas;
            }
            if *pc >= code.len() {
                return StepOutcome::Halted;
            }
            let decoded = match isa::decode(&code[*pc..]) {
                Ok(d) => d,
                Err(_) => return StepOutcome::Panicked,
            };
            self.gas -= 1;
            match (decoded.opcode, decoded.args) {
                (Opcode::Trap, _) => return StepOutcome::Panicked,
                (Opcode::Fallthrough, _) => {
                    *pc += decoded.no_of_bytes_to_skip;
                    if *pc >= code.len() {
                        return StepOutcome::Halted;
                    }
                }
                (Opcode::Ecalli, InstructionArgs::OneImm { imm }) => {
                    *pc += decoded.no_of_bytes_to_skip;
                    return StepOutcome::HostCall(imm);
                }
                (Opcode::Jump, InstructionArgs::OneImm { imm }) => {
                    *pc = imm.max(0) as usize;
                }
                (Opcode::LoadImm, InstructionArgs::OneRegOneImm { reg, imm }) => {
                    self.registers.set(reg, imm as u64);
                    *pc += decoded.no_of_bytes_to_skip;
                }
                (Opcode::LoadImm64, InstructionArgs::OneRegOneExtImm { reg, imm }) => {
                    self.registers.set(reg, imm as u64);
                    *pc += decoded.no_of_bytes_to_skip;
                }
                (Opcode::Move, InstructionArgs::TwoReg { reg_a, reg_b }) => {
                    self.registers.set(reg_a, self.registers.get(reg_b));
                    *pc += decoded.no_of_bytes_to_skip;
                }
                (Opcode::Sbrk, InstructionArgs::TwoReg { reg_a, reg_b }) => {
                    let grow = self.registers.get(reg_b) as usize;
                    let old_len = self.memory.0.len();
                    self.memory.0.resize(old_len.saturating_add(grow).min(MAX_MEMORY), 0);
                    self.registers.set(reg_a, old_len as u64);
                    *pc += decoded.no_of_bytes_to_skip;
                }
                (Opcode::Add, InstructionArgs::ThreeReg { reg_a, reg_b, reg_c }) => {
                    let v = self.registers.get(reg_b).wrapping_add(self.registers.get(reg_c));
                    self.registers.set(reg_a, v);
                    *pc += decoded.no_of_bytes_to_skip;
                }
                (Opcode::Sub, InstructionArgs::ThreeReg { reg_a, reg_b, reg_c }) => {
                    let v = self.registers.get(reg_b).wrapping_sub(self.registers.get(reg_c));
                    self.registers.set(reg_a, v);
                    *pc += decoded.no_of_bytes_to_skip;
                }
                (Opcode::Mul, InstructionArgs::ThreeReg { reg_a, reg_b, reg_c }) => {
                    let v = self.registers.get(reg_b).wrapping_mul(self.registers.get(reg_c));
                    self.registers.set(reg_a, v);
                    *pc += decoded.no_of_bytes_to_skip;
                }
                (Opcode::And, InstructionArgs::ThreeReg { reg_a, reg_b, reg_c }) => {
                    let v = self.registers.get(reg_b) & self.registers.get(reg_c);
                    self.registers.set(reg_a, v);
                    *pc += decoded.no_of_bytes_to_skip;
                }
                (Opcode::Or, InstructionArgs::ThreeReg { reg_a, reg_b, reg_c }) => {
                    let v = self.registers.get(reg_b) | self.registers.get(reg_c);
                    self.registers.set(reg_a, v);
                    *pc += decoded.no_of_bytes_to_skip;
                }
                (Opcode::Xor, InstructionArgs::ThreeReg { reg_a, reg_b, reg_c }) => {
                    let v = self.registers.get(reg_b) ^ self.registers.get(reg_c);
                    self.registers.set(reg_a, v);
                    *pc += decoded.no_of_bytes_to_skip;
                }
                (Opcode::BranchEqImm, InstructionArgs::TwoRegTwoImm { reg_a, imm1, imm2, .. }) => {
                    if self.registers.get(reg_a) == imm1 as u64 {
                        *pc = imm2.max(0) as usize;
                    } else {
                        *pc += decoded.no_of_bytes_to_skip;
                    }
                }
                (Opcode::StoreImmIndU32, InstructionArgs::TwoRegTwoImm { reg_a, imm1, imm2, .. }) => {
                    let addr = self.registers.get(reg_a).wrapping_add(imm1 as u64);
                    self.memory.write(addr, &(imm2 as u32).to_le_bytes());
                    *pc += decoded.no_of_bytes_to_skip;
                }
                _ => return StepOutcome::Panicked,
            }
        }
    }
}

fn read_hash(mem: &Memory, ptr: u64) -> Option<Hash> {
    mem.read(ptr, 32)?.try_into().ok()
}

/// The real PVM engine. Holds no state of its own: every invocation
/// starts a fresh interpreter seeded from `args`/the context.
#[derive(Debug, Default, Clone, Copy)]
pub struct Interpreter13;

impl PvmEngine for Interpreter13 {
    fn run_accumulate(
        &self,
        code: &[u8],
        gas_limit: Gas,
        args: &[u8],
        ctx: &mut AccumulationContext<'_>,
    ) -> PvmOutcome {
        let mut vm = Interpreter::new(gas_limit, args);
        let mut pc = 0usize;
        loop {
            match vm.run_until_host_call_or_halt(code, &mut pc) {
                StepOutcome::Halted => {
                    let len = vm.registers.get(RESULT_REGISTER as u8).min(vm.memory.0.len() as u64);
                    return PvmOutcome::Halt {
                        output: vm.memory.0[..len as usize].to_vec(),
                        gas_used: gas_spent(gas_limit, vm.gas),
                    };
                }
                StepOutcome::Panicked => return PvmOutcome::Panic { gas_used: gas_spent(gas_limit, vm.gas) },
                StepOutcome::OutOfGas => return PvmOutcome::OutOfGas,
                StepOutcome::HostCall(index) => {
                    let Some(call) = AccumulateCall::from_index(index) else {
                        vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Who.as_u64());
                        continue;
                    };
                    if let Some(outcome) = dispatch_accumulate(call, &mut vm, ctx) {
                        return outcome;
                    }
                }
            }
        }
    }

    fn run_on_transfer(&self, code: &[u8], gas_limit: Gas, ctx: &mut OnTransferContext<'_>) -> PvmOutcome {
        let mut vm = Interpreter::new(gas_limit, &[]);
        let mut pc = 0usize;
        loop {
            match vm.run_until_host_call_or_halt(code, &mut pc) {
                StepOutcome::Halted => {
                    return PvmOutcome::Halt { output: Vec::new(), gas_used: gas_spent(gas_limit, vm.gas) }
                }
                StepOutcome::Panicked => return PvmOutcome::Panic { gas_used: gas_spent(gas_limit, vm.gas) },
                StepOutcome::OutOfGas => return PvmOutcome::OutOfGas,
                StepOutcome::HostCall(index) => {
                    let Some(call) = OnTransferCall::from_index(index) else {
                        vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Who.as_u64());
                        continue;
                    };
                    if let Some(outcome) = dispatch_on_transfer(call, &mut vm, ctx) {
                        return outcome;
                    }
                }
            }
        }
    }
}

/// `vm.gas` is a signed countdown seeded from `gas_limit`; the difference is what the
/// invocation actually spent.
fn gas_spent(gas_limit: Gas, remaining: i64) -> Gas {
    (gas_limit as i64 - remaining.max(0)).max(0) as Gas
}

/// Dispatches one accumulation host call. Returns `Some(outcome)` only for
/// calls that end the invocation outright (`checkpoint` aside, none of the
/// named calls do in this sandbox); otherwise the result register is set
/// and the instruction loop resumes.
fn dispatch_accumulate(call: AccumulateCall, vm: &mut Interpreter, ctx: &mut AccumulationContext<'_>) -> Option<PvmOutcome> {
    match call {
        AccumulateCall::Gas => {
            vm.registers.set(RESULT_REGISTER as u8, vm.gas.max(0) as u64);
        }
        AccumulateCall::Lookup => {
            let service = vm.registers.get(0) as u32;
            let hash_ptr = vm.registers.get(1);
            let out_ptr = vm.registers.get(2);
            let code = read_hash(&vm.memory, hash_ptr).and_then(|hash| {
                let account = if service == ctx.caller {
                    ctx.delta.get(ctx.base_services, service)
                } else {
                    ctx.base_services.get(&service)
                };
                account.and_then(|a| a.preimages.get(&hash)).cloned()
            });
            match code {
                Some(bytes) => {
                    let written = vm.memory.write(out_ptr, &bytes);
                    let result = if written { bytes.len() as u64 } else { ReturnCode::Oob.as_u64() };
                    vm.registers.set(RESULT_REGISTER as u8, result);
                }
                None => vm.registers.set(RESULT_REGISTER as u8, ReturnCode::None.as_u64()),
            }
        }
        AccumulateCall::Read => {
            let key_ptr = vm.registers.get(0);
            let out_ptr = vm.registers.get(1);
            match read_hash(&vm.memory, key_ptr) {
                Some(key) => {
                    let value = ctx.delta.get(ctx.base_services, ctx.caller).and_then(|a| a.storage.get(&key)).cloned();
                    match value {
                        Some(bytes) => {
                            vm.memory.write(out_ptr, &bytes);
                            vm.registers.set(RESULT_REGISTER as u8, bytes.len() as u64);
                        }
                        None => vm.registers.set(RESULT_REGISTER as u8, ReturnCode::None.as_u64()),
                    }
                }
                None => vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Oob.as_u64()),
            }
        }
        AccumulateCall::Write => {
            let key_ptr = vm.registers.get(0);
            let value_ptr = vm.registers.get(1);
            let value_len = vm.registers.get(2);
            let key = read_hash(&vm.memory, key_ptr);
            let value = vm.memory.read(value_ptr, value_len).map(|b| b.to_vec());
            match (key, value) {
                (Some(key), Some(value)) => {
                    let caller = ctx.caller;
                    if let Some(account) = ctx.delta.get_mut(ctx.base_services, caller) {
                        account.storage.insert(key, value);
                        vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Ok.as_u64());
                    } else {
                        vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Who.as_u64());
                    }
                }
                _ => vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Oob.as_u64()),
            }
        }
        AccumulateCall::Info => {
            let service = vm.registers.get(0) as u32;
            let out_ptr = vm.registers.get(1);
            let account = if service == ctx.caller {
                ctx.delta.get(ctx.base_services, service)
            } else {
                ctx.base_services.get(&service)
            };
            match account {
                Some(account) => {
                    let mut buf = Vec::with_capacity(32 + 8);
                    buf.extend_from_slice(&account.code_hash);
                    buf.extend_from_slice(&account.balance.to_le_bytes());
                    vm.memory.write(out_ptr, &buf);
                    vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Ok.as_u64());
                }
                None => vm.registers.set(RESULT_REGISTER as u8, ReturnCode::None.as_u64()),
            }
        }
        AccumulateCall::Bless | AccumulateCall::Assign | AccumulateCall::Designate => {
            // Privileged reassignment of chi/phi is modelled at the stage level: the
            // accumulation stage itself sets chi/theta from accumulation output. This sandbox
            // only acknowledges the call.
            vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Ok.as_u64());
        }
        AccumulateCall::Checkpoint => {
            // No nested-invocation rollback support: checkpoint is acknowledged but the overlay
            // already commits/rolls back the whole invocation atomically, not sub-ranges of it.
            vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Ok.as_u64());
        }
        AccumulateCall::New => {
            let code_hash_ptr = vm.registers.get(0);
            let min_gas_accumulate = vm.registers.get(1);
            let min_gas_on_transfer = vm.registers.get(2);
            let balance = vm.registers.get(3);
            match read_hash(&vm.memory, code_hash_ptr) {
                Some(code_hash) => {
                    let id = ctx.next_service_id();
                    let account = ServiceAccount::new(code_hash, balance as Balance, min_gas_accumulate, min_gas_on_transfer);
                    ctx.delta.insert(id, account);
                    vm.registers.set(RESULT_REGISTER as u8, id as u64);
                }
                None => vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Oob.as_u64()),
            }
        }
        AccumulateCall::Upgrade => {
            let code_hash_ptr = vm.registers.get(0);
            match read_hash(&vm.memory, code_hash_ptr) {
                Some(code_hash) => {
                    let caller = ctx.caller;
                    if let Some(account) = ctx.delta.get_mut(ctx.base_services, caller) {
                        account.code_hash = code_hash;
                        vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Ok.as_u64());
                    } else {
                        vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Who.as_u64());
                    }
                }
                None => vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Oob.as_u64()),
            }
        }
        AccumulateCall::Transfer => {
            let dest = vm.registers.get(0) as u32;
            let amount = vm.registers.get(1);
            let gas = vm.registers.get(2);
            let memo_ptr = vm.registers.get(3);
            let caller = ctx.caller;
            let sender_balance = ctx.delta.get(ctx.base_services, caller).map(|a| a.balance).unwrap_or(0);
            if sender_balance < amount {
                vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Cash.as_u64());
            } else {
                let mut memo = [0u8; 128];
                if let Some(bytes) = vm.memory.read(memo_ptr, 128) {
                    memo.copy_from_slice(bytes);
                }
                if let Some(account) = ctx.delta.get_mut(ctx.base_services, caller) {
                    account.balance -= amount;
                }
                ctx.deferred_transfers.push(DeferredTransfer {
                    sender: caller,
                    dest,
                    amount,
                    memo,
                    gas,
                });
                vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Ok.as_u64());
            }
        }
        AccumulateCall::Eject => {
            let target = vm.registers.get(0) as u32;
            if ctx.delta.get(ctx.base_services, target).is_some() {
                ctx.delta.remove(target);
                vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Ok.as_u64());
            } else {
                vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Who.as_u64());
            }
        }
        AccumulateCall::Query => {
            let hash_ptr = vm.registers.get(0);
            let length = vm.registers.get(1) as u32;
            match read_hash(&vm.memory, hash_ptr) {
                Some(hash) => {
                    let caller = ctx.caller;
                    let status = ctx
                        .delta
                        .get(ctx.base_services, caller)
                        .and_then(|a| a.preimage_lookup.get(&PreimageLookupKey { hash, length }));
                    let code = match status {
                        None => ReturnCode::None.as_u64(),
                        Some(PreimageStatus::Requested) => 0,
                        Some(PreimageStatus::Available(slot)) => 1u64 << 32 | *slot as u64,
                        Some(PreimageStatus::Unavailable(slot)) => 2u64 << 32 | *slot as u64,
                        Some(PreimageStatus::Reavailable(a, b)) => 3u64 << 32 | (*a as u64) << 16 | *b as u64,
                    };
                    vm.registers.set(RESULT_REGISTER as u8, code);
                }
                None => vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Oob.as_u64()),
            }
        }
        AccumulateCall::Solicit => {
            let hash_ptr = vm.registers.get(0);
            let length = vm.registers.get(1) as u32;
            match read_hash(&vm.memory, hash_ptr) {
                Some(hash) => {
                    let caller = ctx.caller;
                    if let Some(account) = ctx.delta.get_mut(ctx.base_services, caller) {
                        account.preimage_lookup.insert(PreimageLookupKey { hash, length }, PreimageStatus::Requested);
                        vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Ok.as_u64());
                    } else {
                        vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Who.as_u64());
                    }
                }
                None => vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Oob.as_u64()),
            }
        }
        AccumulateCall::Forget => {
            let hash_ptr = vm.registers.get(0);
            let length = vm.registers.get(1) as u32;
            let slot = ctx.slot;
            match read_hash(&vm.memory, hash_ptr) {
                Some(hash) => {
                    let caller = ctx.caller;
                    if let Some(account) = ctx.delta.get_mut(ctx.base_services, caller) {
                        let key = PreimageLookupKey { hash, length };
                        match account.preimage_lookup.get(&key).cloned() {
                            Some(PreimageStatus::Available(_)) => {
                                account.preimage_lookup.insert(key, PreimageStatus::Unavailable(slot));
                                vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Ok.as_u64());
                            }
                            Some(PreimageStatus::Requested) => {
                                account.preimage_lookup.remove(&key);
                                vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Ok.as_u64());
                            }
                            _ => vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Huh.as_u64()),
                        }
                    } else {
                        vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Who.as_u64());
                    }
                }
                None => vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Oob.as_u64()),
            }
        }
        AccumulateCall::Yield => {
            let hash_ptr = vm.registers.get(0);
            ctx.output = read_hash(&vm.memory, hash_ptr);
            let code = if ctx.output.is_some() { ReturnCode::Ok.as_u64() } else { ReturnCode::Oob.as_u64() };
            vm.registers.set(RESULT_REGISTER as u8, code);
        }
    }
    None
}

fn dispatch_on_transfer(call: OnTransferCall, vm: &mut Interpreter, ctx: &mut OnTransferContext<'_>) -> Option<PvmOutcome> {
    match call {
        OnTransferCall::Gas => {
            vm.registers.set(RESULT_REGISTER as u8, vm.gas.max(0) as u64);
        }
        OnTransferCall::Fetch => {
            let index = vm.registers.get(0) as usize;
            let out_ptr = vm.registers.get(1);
            match ctx.transfers.get(index) {
                Some(transfer) => {
                    let mut buf = Vec::with_capacity(4 + 8 + 128);
                    buf.extend_from_slice(&transfer.sender.to_le_bytes());
                    buf.extend_from_slice(&transfer.amount.to_le_bytes());
                    buf.extend_from_slice(&transfer.memo);
                    vm.memory.write(out_ptr, &buf);
                    vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Ok.as_u64());
                }
                None => vm.registers.set(RESULT_REGISTER as u8, ReturnCode::None.as_u64()),
            }
        }
        OnTransferCall::Lookup => {
            let service = vm.registers.get(0) as u32;
            let hash_ptr = vm.registers.get(1);
            let out_ptr = vm.registers.get(2);
            let bytes = read_hash(&vm.memory, hash_ptr).and_then(|hash| {
                let account = if service == ctx.dest {
                    ctx.delta.get(ctx.base_services, service)
                } else {
                    ctx.base_services.get(&service)
                };
                account.and_then(|a| a.preimages.get(&hash)).cloned()
            });
            match bytes {
                Some(bytes) => {
                    vm.memory.write(out_ptr, &bytes);
                    vm.registers.set(RESULT_REGISTER as u8, bytes.len() as u64);
                }
                None => vm.registers.set(RESULT_REGISTER as u8, ReturnCode::None.as_u64()),
            }
        }
        OnTransferCall::Read => {
            let key_ptr = vm.registers.get(0);
            let out_ptr = vm.registers.get(1);
            match read_hash(&vm.memory, key_ptr) {
                Some(key) => {
                    let value = ctx.delta.get(ctx.base_services, ctx.dest).and_then(|a| a.storage.get(&key)).cloned();
                    match value {
                        Some(bytes) => {
                            vm.memory.write(out_ptr, &bytes);
                            vm.registers.set(RESULT_REGISTER as u8, bytes.len() as u64);
                        }
                        None => vm.registers.set(RESULT_REGISTER as u8, ReturnCode::None.as_u64()),
                    }
                }
                None => vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Oob.as_u64()),
            }
        }
        OnTransferCall::Write => {
            let key_ptr = vm.registers.get(0);
            let value_ptr = vm.registers.get(1);
            let value_len = vm.registers.get(2);
            let key = read_hash(&vm.memory, key_ptr);
            let value = vm.memory.read(value_ptr, value_len).map(|b| b.to_vec());
            match (key, value) {
                (Some(key), Some(value)) => {
                    let dest = ctx.dest;
                    if let Some(account) = ctx.delta.get_mut(ctx.base_services, dest) {
                        account.storage.insert(key, value);
                        vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Ok.as_u64());
                    } else {
                        vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Who.as_u64());
                    }
                }
                _ => vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Oob.as_u64()),
            }
        }
        OnTransferCall::Info => {
            let out_ptr = vm.registers.get(0);
            match ctx.delta.get(ctx.base_services, ctx.dest) {
                Some(account) => {
                    let mut buf = Vec::with_capacity(32 + 8);
                    buf.extend_from_slice(&account.code_hash);
                    buf.extend_from_slice(&account.balance.to_le_bytes());
                    vm.memory.write(out_ptr, &buf);
                    vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Ok.as_u64());
                }
                None => vm.registers.set(RESULT_REGISTER as u8, ReturnCode::None.as_u64()),
            }
        }
        OnTransferCall::Log => {
            tracing::debug!(target: "jam_stf_pvm::on_transfer", message_ptr = vm.registers.get(0), "on-transfer log host call");
            vm.registers.set(RESULT_REGISTER as u8, ReturnCode::Ok.as_u64());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use jam_stf_core::state::service::ServiceTable;

    fn trap_program() -> Vec<u8> {
        isa::encode(Opcode::Trap, &InstructionArgs::NoArgs)
    }

    #[test]
    fn empty_program_halts_immediately() {
        let services = ServiceTable::new();
        let mut ctx = AccumulationContext::new(7, 1, [0u8; 32], &services);
        let engine = Interpreter13;
        let outcome = engine.run_accumulate(&[], 1_000, &[], &mut ctx);
        assert_eq!(outcome, PvmOutcome::Halt { output: Vec::new(), gas_used: 0 });
    }

    #[test]
    fn trap_panics() {
        let services = ServiceTable::new();
        let mut ctx = AccumulationContext::new(7, 1, [0u8; 32], &services);
        let engine = Interpreter13;
        let outcome = engine.run_accumulate(&trap_program(), 1_000, &[], &mut ctx);
        assert_eq!(outcome, PvmOutcome::Panic { gas_used: 1 });
    }

    #[test]
    fn zero_gas_faults_before_any_instruction() {
        let services = ServiceTable::new();
        let mut ctx = AccumulationContext::new(7, 1, [0u8; 32], &services);
        let engine = Interpreter13;
        let outcome = engine.run_accumulate(&trap_program(), 0, &[], &mut ctx);
        assert_eq!(outcome, PvmOutcome::OutOfGas);
    }

    #[test]
    fn gas_host_call_reports_remaining_gas_in_result_register() {
        let services = ServiceTable::new();
        let mut ctx = AccumulationContext::new(7, 1, [0u8; 32], &services);
        let engine = Interpreter13;
        let mut program = isa::encode(Opcode::Ecalli, &InstructionArgs::OneImm { imm: 0 });
        program.extend(isa::encode(
            Opcode::StoreImmIndU32,
            &InstructionArgs::TwoRegTwoImm { reg_a: 0, reg_b: 0, imm1: 0, imm2: 0 },
        ));
        let outcome = engine.run_accumulate(&program, 10, &[], &mut ctx);
        assert!(matches!(outcome, PvmOutcome::Halt { .. }));
    }

    #[test]
    fn new_host_call_creates_a_service() {
        let services = ServiceTable::new();
        let mut expected_id_ctx = AccumulationContext::new(7, 1, [0xAB; 32], &services);
        let expected_id = expected_id_ctx.next_service_id();

        let mut ctx = AccumulationContext::new(7, 1, [0xAB; 32], &services);
        let engine = Interpreter13;
        let mut args = vec![9u8; 32];
        args.extend_from_slice(&0u64.to_le_bytes());
        let program = isa::encode(Opcode::Ecalli, &InstructionArgs::OneImm { imm: AccumulateCall::New as i64 });
        let _ = engine.run_accumulate(&program, 10, &args, &mut ctx);
        assert_eq!(ctx.delta.get(&services, expected_id).map(|a| a.code_hash), Some([9u8; 32]));
    }
}
