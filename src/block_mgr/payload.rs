//! In-memory payloads of saveable blocks.
//!
//! A payload is a list of records which can grow in memory and can be serialized into bytes.
//! Encoding must be concatenative: encoding of `a` followed by encoding of `b` must decode into
//! `a` appended with `b`, and its length must be the sum of the two lengths. Saveable blocks
//! rely on that when they merge data loaded from disk with data added in memory.
//!
//! Two kinds of payloads are provided:
//!  - `EventList` holds fixed-width records, e.g. `TofEvent` or `WeightedEvent`.
//!  - `VarRecords` holds variable-width byte records, each one is prefixed with u32 length.
//!
//! All numbers are little-endian.


use crate::common::errors::Error;
use std::convert::TryInto;


pub trait Payload: Default + Send + 'static {

    /// Number of bytes occupied in memory.
    fn memory_footprint(&self) -> u64;

    /// Number of bytes the payload takes when serialized.
    fn encoded_len(&self) -> u64;

    /// Append serialized payload to buf.
    fn encode(&self, buf: &mut Vec<u8>);

    /// Build payload from serialized form.
    fn decode(data: &[u8]) -> Result<Self, Error>;

    /// Move all records of other to the end of self.
    fn append(&mut self, other: Self);

    fn is_empty(&self) -> bool;

    /// Release all records and the memory they occupy.
    fn clear(&mut self) {
        *self = Self::default();
    }
}


/// Fixed-width record.
pub trait EventRecord: Copy + Send + 'static {

    /// Length of encoded record.
    const ENCODED_LEN: usize;

    fn encode(&self, buf: &mut Vec<u8>);

    /// Decode record from exactly ENCODED_LEN bytes.
    fn decode(data: &[u8]) -> Self;
}


/// Event with time of flight and pulse time.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct TofEvent {
    pub tof:        f64,
    pub pulse_time: i64,
}

impl EventRecord for TofEvent {

    const ENCODED_LEN: usize = 16;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.tof.to_le_bytes());
        buf.extend_from_slice(&self.pulse_time.to_le_bytes());
    }

    fn decode(data: &[u8]) -> Self {
        TofEvent {
            tof:        f64::from_le_bytes(le_bytes(&data[0..8])),
            pulse_time: i64::from_le_bytes(le_bytes(&data[8..16])),
        }
    }
}


/// Event with time of flight, pulse time, weight and squared error.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct WeightedEvent {
    pub tof:            f64,
    pub pulse_time:     i64,
    pub weight:         f32,
    pub error_squared:  f32,
}

impl EventRecord for WeightedEvent {

    const ENCODED_LEN: usize = 24;

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.tof.to_le_bytes());
        buf.extend_from_slice(&self.pulse_time.to_le_bytes());
        buf.extend_from_slice(&self.weight.to_le_bytes());
        buf.extend_from_slice(&self.error_squared.to_le_bytes());
    }

    fn decode(data: &[u8]) -> Self {
        WeightedEvent {
            tof:            f64::from_le_bytes(le_bytes(&data[0..8])),
            pulse_time:     i64::from_le_bytes(le_bytes(&data[8..16])),
            weight:         f32::from_le_bytes(le_bytes(&data[16..20])),
            error_squared:  f32::from_le_bytes(le_bytes(&data[20..24])),
        }
    }
}


// caller always passes slice of the right length
fn le_bytes<const N: usize>(data: &[u8]) -> [u8; N] {
    let mut ret = [0u8; N];
    ret.copy_from_slice(data);
    ret
}


/// List of fixed-width events.
#[derive(Clone, PartialEq, Debug)]
pub struct EventList<E> {
    events: Vec<E>,
}

impl<E: EventRecord> EventList<E> {

    pub fn new() -> Self {
        EventList {
            events: Vec::new(),
        }
    }

    pub fn push(&mut self, event: E) {
        self.events.push(event);
    }

    pub fn extend_from_slice(&mut self, events: &[E]) {
        self.events.extend_from_slice(events);
    }

    pub fn events(&self) -> &[E] {
        &self.events
    }

    /// Events held in memory. For a block modified without loading these are only the
    /// events added since the last flush; edits of the whole list (clear, sort, retain)
    /// must be done through `SaveableBlock::modify_loaded`.
    pub fn events_mut(&mut self) -> &mut Vec<E> {
        &mut self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl<E> Default for EventList<E> {
    fn default() -> Self {
        EventList {
            events: Vec::new(),
        }
    }
}

impl<E: EventRecord> Payload for EventList<E> {

    fn memory_footprint(&self) -> u64 {
        (self.events.len() * std::mem::size_of::<E>()) as u64
    }

    fn encoded_len(&self) -> u64 {
        (self.events.len() * E::ENCODED_LEN) as u64
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.reserve(self.events.len() * E::ENCODED_LEN);
        for e in self.events.iter() {
            e.encode(buf);
        }
    }

    fn decode(data: &[u8]) -> Result<Self, Error> {
        if data.len() % E::ENCODED_LEN != 0 {
            return Err(Error::corrupted_block(format!("length {} is not a multiple of record length {}", data.len(), E::ENCODED_LEN)));
        }

        let events = data.chunks_exact(E::ENCODED_LEN).map(E::decode).collect();

        Ok(EventList {
            events
        })
    }

    fn append(&mut self, mut other: Self) {
        self.events.append(&mut other.events);
    }

    fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}


const RECORD_LEN_SIZE: usize = 4;


/// List of variable-width byte records.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct VarRecords {
    records:    Vec<Vec<u8>>,
    data_len:   usize,
}

impl VarRecords {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Vec<u8>) {
        self.data_len += record.len();
        self.records.push(record);
    }

    pub fn records(&self) -> &[Vec<u8>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

impl Payload for VarRecords {

    fn memory_footprint(&self) -> u64 {
        (self.data_len + self.records.len() * std::mem::size_of::<Vec<u8>>()) as u64
    }

    fn encoded_len(&self) -> u64 {
        (self.data_len + self.records.len() * RECORD_LEN_SIZE) as u64
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.reserve(self.encoded_len() as usize);
        for r in self.records.iter() {
            buf.extend_from_slice(&(r.len() as u32).to_le_bytes());
            buf.extend_from_slice(r);
        }
    }

    fn decode(data: &[u8]) -> Result<Self, Error> {
        let mut ret = VarRecords::new();
        let mut p = 0;

        while p < data.len() {
            if p + RECORD_LEN_SIZE > data.len() {
                return Err(Error::corrupted_block(format!("truncated record length at {}", p)));
            }

            let len_bytes: [u8; RECORD_LEN_SIZE] = data[p..p + RECORD_LEN_SIZE].try_into()
                .map_err(|_| Error::corrupted_block(format!("truncated record length at {}", p)))?;
            let len = u32::from_le_bytes(len_bytes) as usize;
            p += RECORD_LEN_SIZE;

            if p + len > data.len() {
                return Err(Error::corrupted_block(format!("record of length {} at {} exceeds data length {}", len, p, data.len())));
            }

            ret.push(data[p..p + len].to_vec());
            p += len;
        }

        Ok(ret)
    }

    fn append(&mut self, mut other: Self) {
        self.data_len += other.data_len;
        self.records.append(&mut other.records);
    }

    fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}


#[cfg(test)]
mod tests {

    use super::*;
    use crate::common::errors::ErrorKind;

    #[test]
    fn test_event_list() {
        let mut l = EventList::<TofEvent>::new();
        assert!(l.is_empty());
        for i in 0..10 {
            l.push(TofEvent { tof: i as f64 * 1.5, pulse_time: -i });
        }
        assert_eq!(l.encoded_len(), 160);
        assert_eq!(l.memory_footprint(), 10 * std::mem::size_of::<TofEvent>() as u64);

        let mut buf = vec![];
        l.encode(&mut buf);
        assert_eq!(buf.len(), 160);
        assert_eq!(&buf[16..24], &1.5f64.to_le_bytes());

        // merging decoded head with in-memory tail keeps the order
        let mut tail = EventList::new();
        tail.push(TofEvent { tof: 100.0, pulse_time: 7 });
        let mut merged = EventList::<TofEvent>::decode(&buf).expect("Failed to decode");
        merged.append(tail);
        assert_eq!(merged.len(), 11);
        assert_eq!(&merged.events()[..10], l.events());
        assert_eq!(merged.events()[10], TofEvent { tof: 100.0, pulse_time: 7 });

        let err = EventList::<TofEvent>::decode(&buf[..20]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptedBlock);

        l.clear();
        assert!(l.is_empty());
        assert_eq!(l.memory_footprint(), 0);
    }

    #[test]
    fn test_weighted_events() {
        let mut l = EventList::<WeightedEvent>::new();
        l.extend_from_slice(&[
            WeightedEvent { tof: 1.0, pulse_time: 2, weight: 0.5, error_squared: 0.25 },
            WeightedEvent { tof: 3.0, pulse_time: 4, weight: 2.0, error_squared: 4.0 },
        ]);

        let mut buf = vec![];
        l.encode(&mut buf);
        assert_eq!(buf.len() as u64, l.encoded_len());
        assert_eq!(EventList::<WeightedEvent>::decode(&buf).unwrap(), l);
    }

    #[test]
    fn test_var_records() {
        let mut r = VarRecords::new();
        r.push(b"first".to_vec());
        r.push(vec![]);
        r.push(b"third record".to_vec());
        assert_eq!(r.encoded_len(), 5 + 12 + 3 * 4);

        let mut buf = vec![];
        r.encode(&mut buf);
        assert_eq!(buf.len() as u64, r.encoded_len());

        let decoded = VarRecords::decode(&buf).expect("Failed to decode");
        assert_eq!(decoded, r);
        assert_eq!(decoded.records()[2], b"third record".to_vec());

        assert_eq!(VarRecords::decode(&buf[..buf.len() - 1]).unwrap_err().kind(), ErrorKind::CorruptedBlock);
        assert_eq!(VarRecords::decode(&buf[..2]).unwrap_err().kind(), ErrorKind::CorruptedBlock);
        assert!(VarRecords::decode(&[]).unwrap().is_empty());
    }
}
