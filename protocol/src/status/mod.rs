mod system_info;

pub use system_info::{CpuInfo, DriveInfo, MemInfo, NetInfo, OsInfo, SysInfo};
