// Module exports for pure logic
pub mod media;
pub mod migration;           // Legacy single-tab records
pub mod playback;
pub mod session;
pub mod soundboard;          // Facade over tabs, session and playback
pub mod tabs;
pub mod transfer;

#[cfg(test)]
pub mod testing;
