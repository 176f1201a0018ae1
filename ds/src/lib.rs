// Copyright 2026 The opal developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub use opal_err::{Error, FsError, Result};

/// Positional byte access to the store backing a filesystem image.
///
/// The implementation is the sole authority on the backing byte range;
/// filesystems address sectors and clusters exclusively through it. Reads
/// fill the whole buffer or fail. Receivers are shared because a mounted
/// filesystem hands out file streams that borrow it; implementations are
/// expected to be used from a single thread.
pub trait DataStorage {
    fn read(&self, offset: u64, buffer: &mut [u8]) -> Result<()>;

    fn write(&self, offset: u64, buffer: &[u8]) -> Result<()>;

    fn len(&self) -> Result<u64>;

    fn set_len(&self, length: u64) -> Result<()>;

    /// Whether `write` and `set_len` may succeed at all. A filesystem
    /// mounted over a non-writable store refuses every mutation up front.
    fn writable(&self) -> bool;
}

impl<DS: DataStorage + ?Sized> DataStorage for &DS {
    fn read(&self, offset: u64, buffer: &mut [u8]) -> Result<()> {
        (**self).read(offset, buffer)
    }

    fn write(&self, offset: u64, buffer: &[u8]) -> Result<()> {
        (**self).write(offset, buffer)
    }

    fn len(&self) -> Result<u64> {
        (**self).len()
    }

    fn set_len(&self, length: u64) -> Result<()> {
        (**self).set_len(length)
    }

    fn writable(&self) -> bool {
        (**self).writable()
    }
}
