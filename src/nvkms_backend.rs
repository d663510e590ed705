//! NVKMS attribute backend
//!
//! Talks to /dev/nvidia-modeset directly via NVKMS ioctls, the same path the
//! open kernel modules expose to their own clients. Requires the open driver
//! (580+) and read/write access to the modeset node.

use crate::attributes::Attribute;
use crate::backend::{range_to_mask, AttributeBackend, DisplayHandle};
use crate::nvkms::*;
use crate::{NvOptionsError, NvResult};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

const NVIDIA_MODESET_DEVICE: &str = "/dev/nvidia-modeset";
const NVIDIA_VERSION_SYSFS: &str = "/sys/module/nvidia/version";

/// One addressable dpy, resolved at construction.
#[derive(Debug, Clone)]
struct NvKmsDpy {
    disp_handle: NvKmsDispHandle,
    dpy_id: NVDpyId,
    name: String,
    kind: String,
}

/// Attribute backend over the NVKMS ioctl interface.
///
/// Displays are addressed by their enumeration index; the NVKMS handles
/// behind them stay internal. The device allocation lives as long as the
/// modeset file handle, so the handle is kept for the backend's lifetime.
pub struct NvKmsBackend {
    modeset: File,
    device_handle: NvKmsDeviceHandle,
    dpys: Vec<NvKmsDpy>,
}

impl NvKmsBackend {
    /// Open the modeset device, allocate the NVKMS device and enumerate its
    /// dpys. Fails with `BackendUnavailable` when the open driver stack is
    /// not there; callers then fall back to the nvidia-settings backend.
    pub fn new() -> NvResult<Self> {
        let version = driver_version()?;

        let modeset = open_modeset_device()?;
        let fd = modeset.as_raw_fd();

        let (device_handle, disp_handles) = alloc_device(fd, &version)?;

        let mut dpys = Vec::new();
        for disp_handle in disp_handles {
            dpys.extend(enumerate_dpys(fd, device_handle, disp_handle)?);
        }

        Ok(NvKmsBackend {
            modeset,
            device_handle,
            dpys,
        })
    }

    fn fd(&self) -> i32 {
        self.modeset.as_raw_fd()
    }

    fn dpy(&self, display: u32) -> NvResult<&NvKmsDpy> {
        self.dpys.get(display as usize).ok_or_else(|| {
            NvOptionsError::DisplayDetectionFailed(format!(
                "no NVKMS display with index {display}"
            ))
        })
    }

    fn get_attribute_i64(&self, display: u32, attribute: NvKmsDpyAttribute) -> NvResult<i64> {
        let dpy = self.dpy(display)?;
        let mut params = NvKmsGetDpyAttributeParams {
            request: NvKmsGetDpyAttributeRequest {
                device_handle: self.device_handle,
                disp_handle: dpy.disp_handle,
                dpy_id: dpy.dpy_id,
                attribute,
            },
            reply: unsafe { std::mem::zeroed() },
        };

        unsafe {
            nvkms_ioctl(self.fd(), NvKmsIoctlCommand::GetDpyAttribute, &mut params).map_err(
                |e| {
                    NvOptionsError::AttributeQueryFailed(format!(
                        "get {attribute:?} on {}: {e}",
                        dpy.name
                    ))
                },
            )?;
        }

        Ok(params.reply.value)
    }

    fn set_attribute_i64(
        &self,
        display: u32,
        attribute: NvKmsDpyAttribute,
        value: i64,
    ) -> NvResult<()> {
        let dpy = self.dpy(display)?;
        let mut params = NvKmsSetDpyAttributeParams {
            request: NvKmsSetDpyAttributeRequest {
                device_handle: self.device_handle,
                disp_handle: dpy.disp_handle,
                dpy_id: dpy.dpy_id,
                attribute,
                value,
            },
            reply: NvKmsSetDpyAttributeReply { padding: 0 },
        };

        unsafe {
            nvkms_ioctl(self.fd(), NvKmsIoctlCommand::SetDpyAttribute, &mut params).map_err(
                |e| {
                    NvOptionsError::AttributeSetFailed(format!(
                        "set {attribute:?}={value} on {}: {e}",
                        dpy.name
                    ))
                },
            )?;
        }

        Ok(())
    }
}

impl AttributeBackend for NvKmsBackend {
    fn list_displays(&self) -> NvResult<Vec<DisplayHandle>> {
        Ok(self
            .dpys
            .iter()
            .enumerate()
            .map(|(index, dpy)| DisplayHandle {
                id: index as u32,
                name: dpy.name.clone(),
                kind: dpy.kind.clone(),
            })
            .collect())
    }

    fn valid_values(&self, display: u32, attribute: Attribute) -> NvResult<u32> {
        let dpy = self.dpy(display)?;
        let kms_attribute = requested_attribute(attribute)?;

        let mut params = NvKmsGetDpyAttributeValidValuesParams {
            request: NvKmsGetDpyAttributeValidValuesRequest {
                device_handle: self.device_handle,
                disp_handle: dpy.disp_handle,
                dpy_id: dpy.dpy_id,
                attribute: kms_attribute,
            },
            reply: unsafe { std::mem::zeroed() },
        };

        unsafe {
            nvkms_ioctl(
                self.fd(),
                NvKmsIoctlCommand::GetDpyAttributeValidValues,
                &mut params,
            )
            .map_err(|e| {
                NvOptionsError::AttributeQueryFailed(format!(
                    "valid values for {attribute} on {}: {e}",
                    dpy.name
                ))
            })?;

            if params.reply.writable == 0 {
                return Err(NvOptionsError::Unsupported(format!(
                    "{attribute} is read-only on {}",
                    dpy.name
                )));
            }

            match params.reply.attr_type {
                NvKmsAttributeType::IntBits => Ok(params.reply.u.bits.ints),
                NvKmsAttributeType::Bool => Ok(0b11),
                NvKmsAttributeType::Range => {
                    range_to_mask(params.reply.u.range.min, params.reply.u.range.max).ok_or_else(
                        || {
                            NvOptionsError::AttributeQueryFailed(format!(
                                "{attribute} range {}..={} does not fit an option mask",
                                params.reply.u.range.min, params.reply.u.range.max
                            ))
                        },
                    )
                }
            }
        }
    }

    fn current_value(&self, display: u32, attribute: Attribute) -> NvResult<u32> {
        let value = self.get_attribute_i64(display, requested_attribute(attribute)?)?;
        u32::try_from(value).map_err(|_| {
            NvOptionsError::AttributeQueryFailed(format!(
                "{attribute} reported {value}, outside the option value domain"
            ))
        })
    }

    fn set_value(&self, display: u32, attribute: Attribute, value: u32) -> NvResult<()> {
        self.set_attribute_i64(display, requested_attribute(attribute)?, i64::from(value))
    }

    fn is_available(&self) -> bool {
        !self.dpys.is_empty()
    }
}

/// NVKMS carries the requested dithering and color attributes per dpy. FSAA
/// and stereo are X-screen OpenGL state served by the X driver instead, so
/// they come back unsupported here and supported via the shell backend.
fn requested_attribute(attribute: Attribute) -> NvResult<NvKmsDpyAttribute> {
    match attribute {
        Attribute::ColorSpace => Ok(NvKmsDpyAttribute::RequestedColorSpace),
        Attribute::ColorRange => Ok(NvKmsDpyAttribute::RequestedColorRange),
        Attribute::Dithering => Ok(NvKmsDpyAttribute::RequestedDithering),
        Attribute::DitheringMode => Ok(NvKmsDpyAttribute::RequestedDitheringMode),
        Attribute::DitheringDepth => Ok(NvKmsDpyAttribute::RequestedDitheringDepth),
        Attribute::FsaaMode | Attribute::StereoSwapMode => Err(NvOptionsError::Unsupported(
            format!("{attribute} is not exposed through NVKMS"),
        )),
    }
}

fn driver_version() -> NvResult<String> {
    let version = std::fs::read_to_string(NVIDIA_VERSION_SYSFS).map_err(|_| {
        NvOptionsError::BackendUnavailable("NVIDIA kernel module not loaded".to_string())
    })?;
    Ok(version.trim().to_string())
}

fn open_modeset_device() -> NvResult<File> {
    if !std::path::Path::new(NVIDIA_MODESET_DEVICE).exists() {
        return Err(NvOptionsError::BackendUnavailable(
            "nvidia-modeset device not found. Ensure nvidia_drm.modeset=1".to_string(),
        ));
    }

    OpenOptions::new()
        .read(true)
        .write(true)
        .open(NVIDIA_MODESET_DEVICE)
        .map_err(|e| {
            NvOptionsError::BackendUnavailable(format!(
                "failed to open {NVIDIA_MODESET_DEVICE}: {e}. Try adding the user to the video group"
            ))
        })
}

/// Allocate the NVKMS device for GPU 0 and return its handle plus the
/// per-subdevice disp handles. The allocation is released when the modeset
/// fd closes.
fn alloc_device(fd: i32, driver_version: &str) -> NvResult<(NvKmsDeviceHandle, Vec<NvKmsDispHandle>)> {
    let mut version_string = [0u8; NVKMS_NVIDIA_DRIVER_VERSION_STRING_LENGTH];
    let version_bytes = driver_version.as_bytes();
    let copy_len = version_bytes.len().min(NVKMS_NVIDIA_DRIVER_VERSION_STRING_LENGTH - 1);
    version_string[..copy_len].copy_from_slice(&version_bytes[..copy_len]);

    let registry_keys = [RegistryKey {
        name: [0u8; NVKMS_MAX_DEVICE_REGISTRY_KEYNAME_LEN],
        value: 0,
    }; NVKMS_MAX_DEVICE_REGISTRY_KEYS];

    let mut params = NvKmsAllocDeviceParams {
        request: NvKmsAllocDeviceRequest {
            version_string,
            device_id: NvKmsDeviceId {
                rm_device_id: 0,
                mig_device: MIGDeviceId { value: 0 },
            },
            sli_mosaic: 0,
            try_infer_sli_mosaic_from_existing_device: 0,
            no3d: 1,
            enable_console_hotplug_handling: 0,
            registry_keys,
        },
        reply: unsafe { std::mem::zeroed() },
    };

    unsafe {
        nvkms_ioctl(fd, NvKmsIoctlCommand::AllocDevice, &mut params).map_err(|e| {
            NvOptionsError::BackendUnavailable(format!("NVKMS device allocation: {e}"))
        })?;
    }

    match params.reply.status {
        NvKmsAllocDeviceStatus::Success => {}
        NvKmsAllocDeviceStatus::VersionMismatch => {
            return Err(NvOptionsError::BackendUnavailable(format!(
                "NVKMS client version mismatch against driver {driver_version}"
            )));
        }
        status => {
            return Err(NvOptionsError::BackendUnavailable(format!(
                "NVKMS device allocation failed: {status:?}"
            )));
        }
    }

    let num_disps = (params.reply.num_disps as usize).min(NVKMS_MAX_SUBDEVICES);
    Ok((
        params.reply.device_handle,
        params.reply.disp_handles[..num_disps].to_vec(),
    ))
}

fn enumerate_dpys(
    fd: i32,
    device_handle: NvKmsDeviceHandle,
    disp_handle: NvKmsDispHandle,
) -> NvResult<Vec<NvKmsDpy>> {
    let mut params = NvKmsQueryDispParams {
        request: NvKmsQueryDispRequest {
            device_handle,
            disp_handle,
        },
        reply: unsafe { std::mem::zeroed() },
    };

    unsafe {
        nvkms_ioctl(fd, NvKmsIoctlCommand::QueryDisp, &mut params).map_err(|e| {
            NvOptionsError::DisplayDetectionFailed(format!("NVKMS disp query: {e}"))
        })?;
    }

    let mut dpys = Vec::new();
    for dpy_id in params.reply.valid_dpys.id {
        if dpy_id == 0 {
            break;
        }

        let (name, kind) = match query_dpy_static_data(fd, device_handle, disp_handle, dpy_id) {
            Ok(reply) => {
                let connector = reply.format.connector_name();
                (format!("{connector}-{}", reply.type_index), connector.to_string())
            }
            // dpy exists but won't identify itself; keep it addressable
            Err(_) => (format!("DPY-{dpy_id}"), "Unknown".to_string()),
        };

        dpys.push(NvKmsDpy {
            disp_handle,
            dpy_id,
            name,
            kind,
        });
    }

    Ok(dpys)
}

fn query_dpy_static_data(
    fd: i32,
    device_handle: NvKmsDeviceHandle,
    disp_handle: NvKmsDispHandle,
    dpy_id: NVDpyId,
) -> NvResult<NvKmsQueryDpyStaticDataReply> {
    let mut params = NvKmsQueryDpyStaticDataParams {
        request: NvKmsQueryDpyStaticDataRequest {
            device_handle,
            disp_handle,
            dpy_id,
        },
        reply: unsafe { std::mem::zeroed() },
    };

    unsafe {
        nvkms_ioctl(fd, NvKmsIoctlCommand::QueryDpyStaticData, &mut params).map_err(|e| {
            NvOptionsError::DisplayDetectionFailed(format!("NVKMS dpy static data: {e}"))
        })?;
    }

    Ok(params.reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fsaa_and_stereo_route_away_from_nvkms() {
        assert!(requested_attribute(Attribute::FsaaMode).is_err());
        assert!(requested_attribute(Attribute::StereoSwapMode).is_err());
        assert!(requested_attribute(Attribute::ColorSpace).is_ok());
    }
}
