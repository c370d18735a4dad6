use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, warn};

use crate::buffer::ExchangeBuffer;
use crate::error::{ExchangeError, Result};

const INDEX_BITS: u32 = 16;
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;

/// Maximum number of slots the registry can ever allocate.
pub const MAX_INDICATORS: usize = INDEX_MASK as usize;

/// Opaque token designating one live indicator.
///
/// Encoded as `generation << 16 | (slot + 1)`, so it is never zero and a
/// destroyed handle never matches the slot's next occupant.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndicatorHandle(u32);

impl IndicatorHandle {
    fn new(slot: usize, generation: u16) -> Self {
        Self((u32::from(generation) << INDEX_BITS) | (slot as u32 + 1))
    }

    /// Rebuild a handle from its raw value. `0` is never a handle.
    pub fn from_raw(raw: u32) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    /// Rebuild a handle carried as a wire integer.
    pub fn from_wire(value: i64) -> Option<Self> {
        u32::try_from(value).ok().and_then(Self::from_raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    fn slot(self) -> usize {
        ((self.0 & INDEX_MASK) as usize).wrapping_sub(1)
    }

    fn generation(self) -> u16 {
        (self.0 >> INDEX_BITS) as u16
    }
}

impl fmt::Debug for IndicatorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndicatorHandle({}@{})", self.slot(), self.generation())
    }
}

impl fmt::Display for IndicatorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named data stream with its own exchange buffer.
#[derive(Debug)]
pub struct Indicator {
    handle: IndicatorHandle,
    name: String,
    symbol: String,
    period: i32,
    buffer: ExchangeBuffer,
}

impl Indicator {
    pub fn handle(&self) -> IndicatorHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn period(&self) -> i32 {
        self.period
    }

    pub fn buffer(&self) -> &ExchangeBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut ExchangeBuffer {
        &mut self.buffer
    }

    fn info(&self) -> IndicatorInfo {
        IndicatorInfo {
            handle: self.handle,
            symbol: self.symbol.clone(),
            period: self.period,
        }
    }
}

/// One result of [`IndicatorRegistry::find`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorInfo {
    pub handle: IndicatorHandle,
    pub symbol: String,
    pub period: i32,
}

#[derive(Debug)]
struct Slot {
    generation: u16,
    entry: Option<Indicator>,
}

/// Owning collection of all live indicators.
///
/// Slots are reused oldest-freed first, with a bumped generation. A slot
/// whose generation is exhausted is retired instead of reused.
#[derive(Debug, Default)]
pub struct IndicatorRegistry {
    slots: Vec<Slot>,
    free: VecDeque<usize>,
    order: Vec<IndicatorHandle>,
}

impl IndicatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new indicator with an empty buffer.
    pub fn create(
        &mut self,
        name: impl Into<String>,
        symbol: impl Into<String>,
        period: i32,
    ) -> Result<IndicatorHandle> {
        let slot_index = match self.free.pop_front() {
            Some(index) => index,
            None if self.slots.len() < MAX_INDICATORS => {
                self.slots.try_reserve(1).map_err(|_| {
                    ExchangeError::ResourceExhausted("indicator slot allocation failed".into())
                })?;
                self.slots.push(Slot {
                    generation: 0,
                    entry: None,
                });
                self.slots.len() - 1
            }
            None => {
                return Err(ExchangeError::ResourceExhausted(format!(
                    "all {MAX_INDICATORS} indicator slots are in use or retired"
                )))
            }
        };

        let slot = &mut self.slots[slot_index];
        let handle = IndicatorHandle::new(slot_index, slot.generation);
        let indicator = Indicator {
            handle,
            name: name.into(),
            symbol: symbol.into(),
            period,
            buffer: ExchangeBuffer::new(),
        };
        debug!(
            %handle,
            name = %indicator.name,
            symbol = %indicator.symbol,
            period,
            "indicator created"
        );
        slot.entry = Some(indicator);
        self.order.push(handle);

        Ok(handle)
    }

    /// Remove and release the indicator designated by `handle`.
    pub fn destroy(&mut self, handle: IndicatorHandle) -> Result<()> {
        let Some(slot) = self.live_slot_mut(handle) else {
            warn!(%handle, "refusing to destroy unknown indicator handle");
            return Err(ExchangeError::InvalidHandle(i64::from(handle.raw())));
        };

        let removed = slot.entry.take();
        let retired = slot.generation == u16::MAX;
        if !retired {
            slot.generation += 1;
        }

        let slot_index = handle.slot();
        if retired {
            debug!(slot = slot_index, "indicator slot retired");
        } else {
            self.free.push_back(slot_index);
        }
        self.order.retain(|h| *h != handle);

        if let Some(indicator) = removed {
            debug!(%handle, name = %indicator.name, "indicator destroyed");
        }
        Ok(())
    }

    /// True iff `handle` designates a live indicator.
    pub fn contains(&self, handle: IndicatorHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn get(&self, handle: IndicatorHandle) -> Option<&Indicator> {
        self.slots
            .get(handle.slot())
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.entry.as_ref())
    }

    pub fn get_mut(&mut self, handle: IndicatorHandle) -> Option<&mut Indicator> {
        self.live_slot_mut(handle).and_then(|slot| slot.entry.as_mut())
    }

    /// Names of all live indicators, in creation order.
    pub fn list_names(&self) -> Vec<&str> {
        self.iter().map(Indicator::name).collect()
    }

    /// Every live indicator named exactly `name`, in creation order.
    pub fn find(&self, name: &str) -> Vec<IndicatorInfo> {
        self.iter()
            .filter(|indicator| indicator.name == name)
            .map(Indicator::info)
            .collect()
    }

    /// Live indicators in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Indicator> + '_ {
        self.order.iter().filter_map(|handle| self.get(*handle))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn live_slot_mut(&mut self, handle: IndicatorHandle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.slot())
            .filter(|slot| slot.generation == handle.generation() && slot.entry.is_some())
    }
}
