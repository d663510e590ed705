// NVIDIA NVKMS (Kernel Mode Setting) ioctl interface
// Struct layouts follow NVIDIA Open GPU Kernel Modules 580+
// SPDX-License-Identifier: MIT

use std::os::raw::c_ulong;

// ===== Basic Types from nvtypes.h =====
pub type NvU8 = u8;
pub type NvU32 = u32;
pub type NvU64 = u64;
pub type NvS64 = i64;
pub type NvBool = NvU8;

// ===== NVKMS API Types from nvkms-api-types.h =====
pub const NVKMS_MAX_SUBDEVICES: usize = 8; // NV_MAX_SUBDEVICES

pub type NvKmsDeviceHandle = NvU32;
pub type NvKmsDispHandle = NvU32;
pub type NvKmsConnectorHandle = NvU32;

// ===== Display ID (from nv_dpy_id.h) =====
pub type NVDpyId = NvU32;

/// Fixed-size list of dpy ids; unused slots stay zero.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct NVDpyIdList {
    pub id: [NvU32; 8],
}

// ===== Ioctl Infrastructure from nvkms-ioctl.h =====
// Every NVKMS request goes through a single ioctl whose argument names the
// real command and points at its per-command parameter struct.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct NvKmsIoctlParams {
    pub cmd: NvU32,
    pub size: NvU32,
    pub address: NvU64,
}

pub const NVKMS_IOCTL_MAGIC: u8 = b'm';
pub const NVKMS_IOCTL_CMD: u8 = 0;

// ioctl request code: _IOWR(NVKMS_IOCTL_MAGIC, NVKMS_IOCTL_CMD, NvKmsIoctlParams)
pub const NVKMS_IOCTL_IOWR: c_ulong = nix::request_code_readwrite!(
    NVKMS_IOCTL_MAGIC,
    NVKMS_IOCTL_CMD,
    std::mem::size_of::<NvKmsIoctlParams>()
);

// ===== NVKMS Ioctl Commands from nvkms-api.h =====
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NvKmsIoctlCommand {
    AllocDevice = 0,
    FreeDevice = 1,
    QueryDisp = 2,
    QueryConnectorStaticData = 3,
    QueryConnectorDynamicData = 4,
    QueryDpyStaticData = 5,
    QueryDpyDynamicData = 6,
    ValidateModeIndex = 7,
    ValidateMode = 8,
    SetMode = 9,
    SetCursorImage = 10,
    MoveCursor = 11,
    SetLut = 12,
    CheckLutNotifier = 13,
    IdleBaseChannel = 14,
    Flip = 15,
    DeclareDynamicDpyInterest = 16,
    RegisterSurface = 17,
    UnregisterSurface = 18,
    GrantSurface = 19,
    AcquireSurface = 20,
    ReleaseSurface = 21,
    SetDpyAttribute = 22,
    GetDpyAttribute = 23,
    GetDpyAttributeValidValues = 24,
    SetDispAttribute = 25,
    GetDispAttribute = 26,
    GetDispAttributeValidValues = 27,
}

// ===== Display Attributes from nvkms-api.h =====
// Requested* attributes hold what the client asked for; Current* report what
// the hardware is actually doing (they differ under Auto policies).
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NvKmsDpyAttribute {
    BacklightBrightness = 0,
    Scanline = 1,
    HwHead = 2,
    Head = 3,
    RequestedDithering = 4,
    RequestedDitheringMode = 5,
    RequestedDitheringDepth = 6,
    CurrentDithering = 7,
    CurrentDitheringMode = 8,
    CurrentDitheringDepth = 9,
    DigitalVibrance = 10,
    ImageSharpening = 11,
    ImageSharpeningAvailable = 12,
    ImageSharpeningDefault = 13,
    RequestedColorSpace = 14,
    CurrentColorSpace = 15,
    RequestedColorRange = 16,
    CurrentColorRange = 17,
    CurrentColorBpc = 18,
    DigitalSignal = 19,
    DigitalLinkType = 20,
}

// ===== Attribute Type =====
// Discriminates the valid-values union below. IntBits is the interesting
// arm here: a u32 whose set bits are the legal attribute values.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NvKmsAttributeType {
    Range = 0,
    IntBits = 1,
    Bool = 2,
}

// ===== Set Display Attribute Structures =====
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct NvKmsSetDpyAttributeRequest {
    pub device_handle: NvKmsDeviceHandle,
    pub disp_handle: NvKmsDispHandle,
    pub dpy_id: NVDpyId,
    pub attribute: NvKmsDpyAttribute,
    pub value: NvS64,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct NvKmsSetDpyAttributeReply {
    pub padding: NvU32,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct NvKmsSetDpyAttributeParams {
    pub request: NvKmsSetDpyAttributeRequest,
    pub reply: NvKmsSetDpyAttributeReply,
}

// ===== Get Display Attribute Structures =====
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct NvKmsGetDpyAttributeRequest {
    pub device_handle: NvKmsDeviceHandle,
    pub disp_handle: NvKmsDispHandle,
    pub dpy_id: NVDpyId,
    pub attribute: NvKmsDpyAttribute,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct NvKmsGetDpyAttributeReply {
    pub value: NvS64,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct NvKmsGetDpyAttributeParams {
    pub request: NvKmsGetDpyAttributeRequest,
    pub reply: NvKmsGetDpyAttributeReply,
}

// ===== Get Attribute Valid Values =====
#[repr(C)]
#[derive(Copy, Clone)]
pub union NvKmsAttributeValidValuesUnion {
    pub range: NvKmsAttributeRange,
    pub bits: NvKmsAttributeBits,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct NvKmsAttributeRange {
    pub min: NvS64,
    pub max: NvS64,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct NvKmsAttributeBits {
    pub ints: NvU32,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct NvKmsAttributeValidValuesCommonReply {
    pub readable: NvBool,
    pub writable: NvBool,
    pub attr_type: NvKmsAttributeType,
    pub u: NvKmsAttributeValidValuesUnion,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct NvKmsGetDpyAttributeValidValuesRequest {
    pub device_handle: NvKmsDeviceHandle,
    pub disp_handle: NvKmsDispHandle,
    pub dpy_id: NVDpyId,
    pub attribute: NvKmsDpyAttribute,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct NvKmsGetDpyAttributeValidValuesParams {
    pub request: NvKmsGetDpyAttributeValidValuesRequest,
    pub reply: NvKmsAttributeValidValuesCommonReply,
}

// ===== Query Display Structures =====
#[repr(C)]
#[derive(Copy, Clone)]
pub struct NvKmsQueryDispRequest {
    pub device_handle: NvKmsDeviceHandle,
    pub disp_handle: NvKmsDispHandle,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct NvKmsQueryDispReply {
    pub valid_dpys: NVDpyIdList,
    pub boot_dpys: NVDpyIdList,
    pub mux_dpys: NVDpyIdList,
    pub connector_handles: [NvKmsConnectorHandle; 32],
    pub num_connectors: NvU32,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct NvKmsQueryDispParams {
    pub request: NvKmsQueryDispRequest,
    pub reply: NvKmsQueryDispReply,
}

// ===== Query Dpy Static Data Structures =====
pub const NVKMS_DP_ADDRESS_STRING_LENGTH: usize = 24;

#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NvKmsConnectorSignalFormat {
    Vga = 0,
    Lvds = 1,
    Tmds = 2,
    Dp = 3,
    Dsi = 4,
    Unknown = 5,
}

impl NvKmsConnectorSignalFormat {
    /// Connector prefix as it appears in dpy names ("DP-0", "TMDS-1").
    pub fn connector_name(self) -> &'static str {
        match self {
            NvKmsConnectorSignalFormat::Vga => "VGA",
            NvKmsConnectorSignalFormat::Lvds => "LVDS",
            NvKmsConnectorSignalFormat::Tmds => "TMDS",
            NvKmsConnectorSignalFormat::Dp => "DP",
            NvKmsConnectorSignalFormat::Dsi => "DSI",
            NvKmsConnectorSignalFormat::Unknown => "Unknown",
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct NvKmsQueryDpyStaticDataRequest {
    pub device_handle: NvKmsDeviceHandle,
    pub disp_handle: NvKmsDispHandle,
    pub dpy_id: NVDpyId,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct NvKmsQueryDpyStaticDataReply {
    pub connector_handle: NvKmsConnectorHandle,
    /// Per-signal-format index, the "0" in "DP-0".
    pub type_index: NvU32,
    pub format: NvKmsConnectorSignalFormat,
    pub mobile_internal: NvBool,
    pub is_dp_mst: NvBool,
    pub dp_address: [u8; NVKMS_DP_ADDRESS_STRING_LENGTH],
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct NvKmsQueryDpyStaticDataParams {
    pub request: NvKmsQueryDpyStaticDataRequest,
    pub reply: NvKmsQueryDpyStaticDataReply,
}

// ===== Alloc Device Structures =====
pub const NVKMS_NVIDIA_DRIVER_VERSION_STRING_LENGTH: usize = 64;
pub const NVKMS_MAX_DEVICE_REGISTRY_KEYS: usize = 16;
pub const NVKMS_MAX_DEVICE_REGISTRY_KEYNAME_LEN: usize = 64;

#[repr(C)]
#[derive(Copy, Clone)]
pub struct NvKmsDeviceId {
    pub rm_device_id: NvU32,
    pub mig_device: MIGDeviceId,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct MIGDeviceId {
    pub value: NvU32, // 0 = NO_MIG_DEVICE
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct RegistryKey {
    pub name: [u8; NVKMS_MAX_DEVICE_REGISTRY_KEYNAME_LEN],
    pub value: NvU32,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct NvKmsAllocDeviceRequest {
    /// Must match the loaded kernel module's version string exactly.
    pub version_string: [u8; NVKMS_NVIDIA_DRIVER_VERSION_STRING_LENGTH],
    pub device_id: NvKmsDeviceId,
    pub sli_mosaic: NvBool,
    pub try_infer_sli_mosaic_from_existing_device: NvBool,
    pub no3d: NvBool,
    pub enable_console_hotplug_handling: NvBool,
    pub registry_keys: [RegistryKey; NVKMS_MAX_DEVICE_REGISTRY_KEYS],
}

#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NvKmsAllocDeviceStatus {
    Success = 0,
    VersionMismatch = 1,
    BadDeviceId = 2,
    AlreadyAllocated = 3,
    Unspecified = 4,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct NvKmsAllocDeviceReply {
    pub device_handle: NvKmsDeviceHandle,
    pub disp_handles: [NvKmsDispHandle; NVKMS_MAX_SUBDEVICES],
    pub num_disps: NvU32,
    pub status: NvKmsAllocDeviceStatus,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct NvKmsAllocDeviceParams {
    pub request: NvKmsAllocDeviceRequest,
    pub reply: NvKmsAllocDeviceReply,
}

// ===== Helper Functions =====

/// Wrap a per-command parameter struct for the outer ioctl.
pub fn create_ioctl_params<T>(cmd: NvKmsIoctlCommand, params: &T) -> NvKmsIoctlParams {
    NvKmsIoctlParams {
        cmd: cmd as NvU32,
        size: std::mem::size_of::<T>() as NvU32,
        address: params as *const T as NvU64,
    }
}

/// Perform an NVKMS ioctl on an open /dev/nvidia-modeset fd.
pub unsafe fn nvkms_ioctl<T>(
    fd: std::os::unix::io::RawFd,
    cmd: NvKmsIoctlCommand,
    params: &mut T,
) -> Result<i32, std::io::Error> {
    let ioctl_params = create_ioctl_params(cmd, params);

    // SAFETY: Caller ensures fd is valid and params matches the ioctl command
    let result = unsafe { libc::ioctl(fd, NVKMS_IOCTL_IOWR, &ioctl_params as *const _) };

    if result == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_numbers_match_nvkms_api() {
        assert_eq!(NvKmsIoctlCommand::AllocDevice as u32, 0);
        assert_eq!(NvKmsIoctlCommand::QueryDpyStaticData as u32, 5);
        assert_eq!(NvKmsIoctlCommand::SetDpyAttribute as u32, 22);
        assert_eq!(NvKmsIoctlCommand::GetDpyAttribute as u32, 23);
        assert_eq!(NvKmsIoctlCommand::GetDpyAttributeValidValues as u32, 24);
    }

    #[test]
    fn ioctl_params_carry_payload_size_and_address() {
        let params: NvKmsQueryDispParams = unsafe { std::mem::zeroed() };
        let wrapped = create_ioctl_params(NvKmsIoctlCommand::QueryDisp, &params);
        assert_eq!(wrapped.cmd, NvKmsIoctlCommand::QueryDisp as u32);
        assert_eq!(
            wrapped.size as usize,
            std::mem::size_of::<NvKmsQueryDispParams>()
        );
        assert_eq!(wrapped.address, &params as *const _ as u64);
    }
}
