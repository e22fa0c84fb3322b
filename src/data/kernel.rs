//! Element-wise numeric kernels over `f64` buffers.
//!
//! The bulk of each buffer is processed four lanes at a time with `wide`; the
//! tail is finished in scalar code. All kernels require equal-length slices
//! and are checked by the callers in `value.rs`.

use wide::f64x4;

#[inline(always)]
fn load(s: &[f64]) -> f64x4 { f64x4::from([s[0], s[1], s[2], s[3]]) }

#[inline(always)]
fn store(dst: &mut [f64], v: f64x4) { dst[..4].copy_from_slice(&v.to_array()); }

/// `dst[i] = a[i] + f * (b[i] - a[i])`
pub fn lerp(dst: &mut [f64], a: &[f64], b: &[f64], f: f64) {
    debug_assert!(dst.len() == a.len() && a.len() == b.len());
    let fv = f64x4::splat(f);
    let split = dst.len() - dst.len() % 4;

    for i in (0..split).step_by(4) {
        let va = load(&a[i..]);
        let vb = load(&b[i..]);
        store(&mut dst[i..], va + fv * (vb - va));
    }
    for i in split..dst.len() {
        dst[i] = a[i] + f * (b[i] - a[i]);
    }
}

/// `dst[i] = k * a[i]`
pub fn scale(dst: &mut [f64], a: &[f64], k: f64) {
    debug_assert!(dst.len() == a.len());
    let kv = f64x4::splat(k);
    let split = dst.len() - dst.len() % 4;

    for i in (0..split).step_by(4) {
        store(&mut dst[i..], load(&a[i..]) * kv);
    }
    for i in split..dst.len() {
        dst[i] = k * a[i];
    }
}

/// `acc[i] += k * x[i]`
pub fn axpy(acc: &mut [f64], x: &[f64], k: f64) {
    debug_assert!(acc.len() == x.len());
    let kv = f64x4::splat(k);
    let split = acc.len() - acc.len() % 4;

    for i in (0..split).step_by(4) {
        let sum = load(&acc[i..]) + load(&x[i..]) * kv;
        store(&mut acc[i..], sum);
    }
    for i in split..acc.len() {
        acc[i] += k * x[i];
    }
}
