//! Output buffers with explicit host/device residency.
//!
//! An [`OutputBuffer`] always owns a host allocation. Device artifacts attach a
//! [`DeviceStorage`] on first use and write there; the host copy is then stale
//! until [`OutputBuffer::copy_to_host`] blocks on the device and copies back.
//!
//! ```text
//! realize (host plan)    ──> host    [Location::Host]
//! realize (device plan)  ──> device  [Location::Device] ──copy_to_host──> host
//! ```

use std::fmt;

use pixsched_core::{Extent, Image};

use crate::error::{ComputeResult, RuntimeError};
use crate::target::DeviceApi;

/// Where the current contents of a buffer live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Host,
    /// Written on a device; the host view is stale.
    Device,
}

/// Helper trait for downcasting.
pub trait AsAny: 'static {
    fn as_any(&self) -> &dyn std::any::Any;
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// Device-side allocation backing an [`OutputBuffer`].
pub trait DeviceStorage: Send + Sync + AsAny + fmt::Debug {
    fn api(&self) -> DeviceApi;

    /// Size of the device allocation in bytes.
    fn size_bytes(&self) -> u64;

    /// Blocks until pending device writes finish, then copies into `host`.
    fn read_back(&self, host: &mut [u8]) -> ComputeResult<()>;
}

/// Destination of a pipeline run.
pub struct OutputBuffer {
    extent: Extent,
    host: Vec<u8>,
    device: Option<Box<dyn DeviceStorage>>,
    device_dirty: bool,
}

impl OutputBuffer {
    /// Allocates a zeroed host buffer.
    pub fn new(extent: Extent) -> ComputeResult<Self> {
        extent.validate()?;
        Ok(Self {
            extent,
            host: vec![0; extent.len()],
            device: None,
            device_dirty: false,
        })
    }

    /// Allocates a buffer matching `image`.
    pub fn like(image: &Image) -> ComputeResult<Self> {
        Self::new(image.extent())
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn location(&self) -> Location {
        if self.device_dirty {
            Location::Device
        } else {
            Location::Host
        }
    }

    /// API of the attached device allocation, if any.
    pub fn device_api(&self) -> Option<DeviceApi> {
        self.device.as_ref().map(|d| d.api())
    }

    /// Makes device writes visible on the host.
    ///
    /// Blocks until the device has finished every write to this buffer. A
    /// no-op when the host view is already current.
    pub fn copy_to_host(&mut self) -> ComputeResult<()> {
        if !self.device_dirty {
            return Ok(());
        }
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| RuntimeError::Device("buffer marked dirty without device storage".into()))?;
        device.read_back(&mut self.host)?;
        self.device_dirty = false;
        Ok(())
    }

    /// Host samples, interleaved.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::StaleHost`] if the last write happened on a device and
    /// has not been copied back.
    pub fn host(&self) -> ComputeResult<&[u8]> {
        if self.device_dirty {
            return Err(RuntimeError::StaleHost.into());
        }
        Ok(&self.host)
    }

    /// Host sample at `(x, y, c)`.
    pub fn get(&self, x: u32, y: u32, c: u32) -> ComputeResult<u8> {
        if !self.extent.contains(x, y, c) {
            return Err(pixsched_core::Error::out_of_bounds(x, y, c, self.extent).into());
        }
        Ok(self.host()?[self.extent.index(x, y, c)])
    }

    /// Copies the host view into an [`Image`].
    pub fn to_image(&self) -> ComputeResult<Image> {
        let e = self.extent;
        Ok(Image::from_data(e.width, e.height, e.channels, self.host()?.to_vec())?)
    }

    /// Converts into an [`Image`] without copying.
    pub fn into_image(self) -> ComputeResult<Image> {
        if self.device_dirty {
            return Err(RuntimeError::StaleHost.into());
        }
        let e = self.extent;
        Ok(Image::from_data(e.width, e.height, e.channels, self.host)?)
    }

    /// Host view for a host-side write; the host becomes authoritative.
    pub(crate) fn host_mut(&mut self) -> &mut [u8] {
        self.device_dirty = false;
        &mut self.host
    }

    /// Device storage of type `S`, replaced by `make()` unless the attached
    /// storage is an `S` accepted by `reuse`.
    pub(crate) fn device_mut<S, R, M>(&mut self, reuse: R, make: M) -> ComputeResult<&mut S>
    where
        S: DeviceStorage,
        R: FnOnce(&S) -> bool,
        M: FnOnce() -> ComputeResult<S>,
    {
        let reusable = self
            .device
            .as_ref()
            .and_then(|d| d.as_any().downcast_ref::<S>())
            .is_some_and(reuse);
        if !reusable {
            self.device = Some(Box::new(make()?));
        }
        self.device
            .as_mut()
            .and_then(|d| d.as_any_mut().downcast_mut::<S>())
            .ok_or_else(|| RuntimeError::Device("device storage type changed".into()).into())
    }

    /// Records that the device copy now holds the latest write.
    pub(crate) fn mark_device_written(&mut self) {
        self.device_dirty = true;
    }
}

impl fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("extent", &self.extent)
            .field("location", &self.location())
            .field("device", &self.device)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FakeStorage {
        value: u8,
    }

    impl AsAny for FakeStorage {
        fn as_any(&self) -> &dyn std::any::Any { self }
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
    }

    impl DeviceStorage for FakeStorage {
        fn api(&self) -> DeviceApi {
            DeviceApi::Emulated
        }

        fn size_bytes(&self) -> u64 {
            0
        }

        fn read_back(&self, host: &mut [u8]) -> ComputeResult<()> {
            host.fill(self.value);
            Ok(())
        }
    }

    #[test]
    fn test_new_buffer_is_host_resident() {
        let buf = OutputBuffer::new(Extent::new(2, 2, 3)).unwrap();
        assert_eq!(buf.location(), Location::Host);
        assert_eq!(buf.host().unwrap().len(), 12);
        assert_eq!(buf.device_api(), None);
    }

    #[test]
    fn test_empty_extent_rejected() {
        assert!(OutputBuffer::new(Extent::new(0, 2, 3)).is_err());
    }

    #[test]
    fn test_stale_until_copied() {
        let mut buf = OutputBuffer::new(Extent::new(2, 1, 1)).unwrap();
        buf.device_mut(|_: &FakeStorage| true, || Ok(FakeStorage { value: 42 })).unwrap();
        buf.mark_device_written();

        assert_eq!(buf.location(), Location::Device);
        assert!(matches!(
            buf.host().unwrap_err(),
            crate::ComputeError::Runtime(RuntimeError::StaleHost)
        ));
        assert!(buf.to_image().is_err());

        buf.copy_to_host().unwrap();
        assert_eq!(buf.location(), Location::Host);
        assert_eq!(buf.host().unwrap(), &[42, 42]);
        assert_eq!(buf.get(1, 0, 0).unwrap(), 42);
    }

    #[test]
    fn test_device_storage_reused_or_replaced() {
        let mut buf = OutputBuffer::new(Extent::new(1, 1, 1)).unwrap();
        buf.device_mut(|_: &FakeStorage| true, || Ok(FakeStorage { value: 1 })).unwrap();
        let s = buf.device_mut(|_: &FakeStorage| true, || Ok(FakeStorage { value: 2 })).unwrap();
        assert_eq!(s.value, 1);
        let s = buf.device_mut(|s: &FakeStorage| s.value == 9, || Ok(FakeStorage { value: 3 })).unwrap();
        assert_eq!(s.value, 3);
    }

    #[test]
    fn test_host_write_clears_dirty() {
        let mut buf = OutputBuffer::new(Extent::new(1, 1, 1)).unwrap();
        buf.device_mut(|_: &FakeStorage| true, || Ok(FakeStorage { value: 5 })).unwrap();
        buf.mark_device_written();
        buf.host_mut()[0] = 7;
        assert_eq!(buf.location(), Location::Host);
        assert_eq!(buf.into_image().unwrap().data(), &[7]);
    }
}
