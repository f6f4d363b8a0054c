//! Addressable register/coil store backing the plant simulator.
//!
//! Four independently locked banks. Every `get`/`set` is atomic with respect
//! to other calls on the same bank, but there is no transaction spanning
//! several calls: a bus reader may observe the store between two writes of
//! the same tick. Out-of-bounds access is a programming error and fails with
//! [`StoreError::OutOfRange`].

use crate::map::BANK_SIZE;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bank {
    DiscreteInputs,
    Coils,
    HoldingRegisters,
    InputRegisters,
}

impl Bank {
    pub const ALL: [Bank; 4] = [
        Bank::DiscreteInputs,
        Bank::Coils,
        Bank::HoldingRegisters,
        Bank::InputRegisters,
    ];

    /// Boolean-valued banks store 0/1 per slot.
    pub fn is_bit_bank(self) -> bool {
        matches!(self, Bank::DiscreteInputs | Bank::Coils)
    }

    fn index(self) -> usize {
        match self {
            Bank::DiscreteInputs => 0,
            Bank::Coils => 1,
            Bank::HoldingRegisters => 2,
            Bank::InputRegisters => 3,
        }
    }
}

impl core::fmt::Display for Bank {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Bank::DiscreteInputs => "discrete inputs",
            Bank::Coils => "coils",
            Bank::HoldingRegisters => "holding registers",
            Bank::InputRegisters => "input registers",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{bank} access out of range: start {start}, count {count}, bank size {size}")]
    OutOfRange {
        bank: Bank,
        start: u16,
        count: usize,
        size: usize,
    },
}

#[derive(Debug)]
pub struct DataStore {
    banks: [RwLock<Vec<u16>>; 4],
    size: usize,
}

impl DataStore {
    pub fn new() -> Self {
        Self::with_size(BANK_SIZE)
    }

    /// All four banks get `size` zeroed slots.
    pub fn with_size(size: usize) -> Self {
        Self {
            banks: [
                RwLock::new(vec![0; size]),
                RwLock::new(vec![0; size]),
                RwLock::new(vec![0; size]),
                RwLock::new(vec![0; size]),
            ],
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, bank: Bank, start: u16, count: usize) -> Result<Vec<u16>, StoreError> {
        let range = self.checked_range(bank, start, count)?;
        let slots = self.banks[bank.index()]
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(slots[range].to_vec())
    }

    pub fn set(&self, bank: Bank, start: u16, values: &[u16]) -> Result<(), StoreError> {
        let range = self.checked_range(bank, start, values.len())?;
        let mut slots = self.banks[bank.index()]
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if bank.is_bit_bank() {
            for (slot, value) in slots[range].iter_mut().zip(values) {
                *slot = u16::from(*value != 0);
            }
        } else {
            slots[range].copy_from_slice(values);
        }
        Ok(())
    }

    pub fn get_bits(&self, bank: Bank, start: u16, count: usize) -> Result<Vec<bool>, StoreError> {
        Ok(self
            .get(bank, start, count)?
            .into_iter()
            .map(|v| v != 0)
            .collect())
    }

    pub fn set_bits(&self, bank: Bank, start: u16, bits: &[bool]) -> Result<(), StoreError> {
        let values: Vec<u16> = bits.iter().map(|&b| u16::from(b)).collect();
        self.set(bank, start, &values)
    }

    fn checked_range(
        &self,
        bank: Bank,
        start: u16,
        count: usize,
    ) -> Result<core::ops::Range<usize>, StoreError> {
        let begin = usize::from(start);
        match begin.checked_add(count) {
            Some(end) if end <= self.size => Ok(begin..end),
            _ => Err(StoreError::OutOfRange {
                bank,
                start,
                count,
                size: self.size,
            }),
        }
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}
