use std::collections::BTreeSet;

/// Default Minecraft server port; allocation counts upward from here.
pub const BASE_PORT: u16 = 25565;

/// Smallest port >= [`BASE_PORT`] not present in `existing`. Pure and
/// side-effect-free: the result is only reserved once the caller persists it,
/// so two concurrent allocations against the same registry state can hand out
/// the same number. Within one process the registry's write lock serializes
/// allocate-then-save; across processes the race stands.
pub fn allocate(existing: &BTreeSet<u16>) -> u16 {
    let mut port = BASE_PORT;
    while existing.contains(&port) {
        port += 1;
    }
    port
}
