//! Irreversible wiping of key material.
//!
//! Used when the working key is dropped on lock and for transient digests.
//! With the `paranoid` feature the buffer is overwritten several times
//! before the final zero pass.

use zeroize::Zeroize;

/// Irreversibly destroys the provided memory slice.
#[inline(never)]
pub fn burn_slice(slice: &mut [u8]) {
    #[cfg(feature = "paranoid")]
    {
        // Pass 1: all ones
        for byte in slice.iter_mut() {
            unsafe { core::ptr::write_volatile(byte, 0xFF) };
        }
        core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);

        // Pass 2: position pattern, flips bits relative to pass 1
        for (i, byte) in slice.iter_mut().enumerate() {
            unsafe { core::ptr::write_volatile(byte, (i % 255) as u8) };
        }
        core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
    }

    slice.zeroize();

    core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
}
