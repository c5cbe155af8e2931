use std::path::PathBuf;

/// Where and how the standard finder searches for debug info.
#[derive(Debug, Clone)]
pub struct DebugInfoOptions
{
    /// Directories searched for build-id stores and detached debug files.
    pub directories: Vec<PathBuf>,
    /// Try `<dir>/.build-id/xx/yyyy.debug` lookups.
    pub try_build_id: bool,
    /// Try `.gnu_debuglink` targets next to the binary and under
    /// `directories`.
    pub try_debug_link: bool,
}

impl Default for DebugInfoOptions
{
    fn default() -> Self
    {
        Self {
            directories: vec![PathBuf::from("/usr/lib/debug")],
            try_build_id: true,
            try_debug_link: true,
        }
    }
}

impl DebugInfoOptions
{
    /// Options that never touch the filesystem outside explicit paths.
    pub fn no_search() -> Self
    {
        Self {
            directories: Vec::new(),
            try_build_id: false,
            try_debug_link: false,
        }
    }
}
