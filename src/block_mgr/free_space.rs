/// Free space map of the backing store.
///
/// Every byte in `[0, file_end)` is either occupied by some block or belongs to exactly one
/// free entry. Free entries never overlap and never touch each other: adjacent entries are
/// merged as soon as they appear. Space beyond `file_end` is the unallocated tail.
///
/// Allocation is best-fit: the smallest free entry which is large enough is used, and the
/// remainder of it stays free. If there is no such entry the file is extended.


use crate::common::errors::Error;
use crate::common::defs::FileRange;
use std::collections::BTreeMap;
use std::collections::BTreeSet;


pub struct FreeSpaceMap {
    by_offset:      BTreeMap<u64, u64>,
    by_size:        BTreeSet<(u64, u64)>,
    file_end:       u64,
    size_limit:     Option<u64>,
}

impl FreeSpaceMap {

    /// Create empty map; size_limit 0 means the file can grow without limit.
    pub fn new(size_limit: u64) -> Self {
        FreeSpaceMap {
            by_offset:  BTreeMap::new(),
            by_size:    BTreeSet::new(),
            file_end:   0,
            size_limit: if size_limit == 0 { None } else { Some(size_limit) },
        }
    }

    /// Find place for `size` bytes and return its offset.
    pub fn allocate(&mut self, size: u64) -> Result<u64, Error> {
        if size == 0 {
            return Err(Error::incorrect_allocation_size());
        }

        if let Some(&(len, offset)) = self.by_size.range((size, 0)..).next() {
            self.remove_entry(offset, len);
            if len > size {
                self.insert_entry(offset + size, len - size);
            }
            return Ok(offset);
        }

        let offset = self.file_end;
        let new_end = offset.checked_add(size).ok_or_else(Error::allocator_exhausted)?;
        if let Some(limit) = self.size_limit {
            if new_end > limit {
                return Err(Error::allocator_exhausted());
            }
        }
        self.file_end = new_end;

        Ok(offset)
    }

    /// Return range to the free pool merging it with neighbour free entries.
    pub fn free(&mut self, offset: u64, size: u64) -> Result<(), Error> {
        if size == 0 {
            return Ok(());
        }

        let end = offset.checked_add(size)
            .ok_or_else(|| Error::invalid_free_range(format!("range at {} of size {} overflows", offset, size)))?;

        if end > self.file_end {
            return Err(Error::invalid_free_range(format!("range {}..{} is beyond end of file {}", offset, end, self.file_end)));
        }

        // the last entry starting before the end of the range is the only one which can overlap it
        if let Some((&o, &l)) = self.by_offset.range(..end).next_back() {
            if o + l > offset {
                return Err(Error::invalid_free_range(format!("range {}..{} overlaps free entry {}..{}", offset, end, o, o + l)));
            }
        }

        let mut start = offset;
        let mut len = size;

        let prev = self.by_offset.range(..offset).next_back().map(|(&o, &l)| (o, l));
        if let Some((o, l)) = prev {
            if o + l == offset {
                self.remove_entry(o, l);
                start = o;
                len += l;
            }
        }

        if let Some(&l) = self.by_offset.get(&end) {
            self.remove_entry(end, l);
            len += l;
        }

        self.insert_entry(start, len);

        Ok(())
    }

    /// Free trailing part of a range when the data occupying it became smaller.
    pub fn shrink(&mut self, offset: u64, old_size: u64, new_size: u64) -> Result<(), Error> {
        if new_size > old_size {
            return Err(Error::invalid_free_range(format!("can't shrink range at {} from {} to {} bytes", offset, old_size, new_size)));
        }

        self.free(offset + new_size, old_size - new_size)
    }

    /// Offset of the unallocated tail.
    pub fn file_end(&self) -> u64 {
        self.file_end
    }

    /// Set end of file, e.g. when existing file is reopened.
    pub fn set_file_end(&mut self, file_end: u64) -> Result<(), Error> {
        if let Some((&o, &l)) = self.by_offset.iter().next_back() {
            if o + l > file_end {
                return Err(Error::invalid_free_range(format!("free entry {}..{} is beyond new end of file {}", o, o + l, file_end)));
            }
        }
        self.file_end = file_end;
        Ok(())
    }

    /// Total number of free bytes below end of file.
    pub fn free_bytes(&self) -> u64 {
        self.by_offset.values().sum()
    }

    /// Number of free entries.
    pub fn len(&self) -> usize {
        self.by_offset.len()
    }

    /// Free entries ordered by offset.
    pub fn entries(&self) -> Vec<FileRange> {
        self.by_offset.iter().map(|(&o, &l)| FileRange::new(o, l)).collect()
    }

    /// Free entries as flat list of offset and length pairs, suitable for persisting.
    pub fn free_space_vector(&self) -> Vec<u64> {
        let mut ret = Vec::with_capacity(self.by_offset.len() * 2);
        for (&o, &l) in self.by_offset.iter() {
            ret.push(o);
            ret.push(l);
        }
        ret
    }

    /// Replace the map content with previously persisted free entries.
    pub fn set_free_space(&mut self, free: &[u64], file_end: u64) -> Result<(), Error> {
        if free.len() % 2 != 0 {
            return Err(Error::invalid_free_range(format!("free space vector has odd length {}", free.len())));
        }

        let mut restored = FreeSpaceMap {
            by_offset:  BTreeMap::new(),
            by_size:    BTreeSet::new(),
            file_end,
            size_limit: self.size_limit,
        };

        for pair in free.chunks(2) {
            restored.free(pair[0], pair[1])?;
        }

        *self = restored;

        Ok(())
    }

    fn insert_entry(&mut self, offset: u64, len: u64) {
        self.by_offset.insert(offset, len);
        self.by_size.insert((len, offset));
    }

    fn remove_entry(&mut self, offset: u64, len: u64) {
        self.by_offset.remove(&offset);
        self.by_size.remove(&(len, offset));
    }
}
