// Integration tests for axon-core kernels
//
// These tests check the algebraic properties of the tensor kernels:
// element-wise round trips, batch broadcasting, adjoint consistency of the
// convolution and pooling gradients, and agreement between the sequential
// and the rayon backend.

use approx::assert_abs_diff_eq;
use axon_core::{
    backend_for, BackendKind, PaddingType, PoolType, Result, Shape, Tensor,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn dot(a: &Tensor, b: &Tensor) -> f32 {
    a.values().iter().zip(b.values()).map(|(x, y)| x * y).sum()
}

fn assert_vec_approx(got: &[f32], expected: &[f32], tol: f32) {
    assert_eq!(got.len(), expected.len(), "length mismatch");
    for (i, (g, e)) in got.iter().zip(expected).enumerate() {
        assert!(
            (g - e).abs() <= tol,
            "index {i}: got {g} expected {e} (tol {tol})"
        );
    }
}

const MODES: [PaddingType; 3] = [PaddingType::Valid, PaddingType::Same, PaddingType::Full];

// Element-wise properties

proptest! {
    #[test]
    fn prop_add_then_sub_round_trips(
        values in prop::collection::vec((-100.0f32..100.0, -100.0f32..100.0), 1..64)
    ) {
        let (a, b): (Vec<f32>, Vec<f32>) = values.into_iter().unzip();
        let shape = Shape::new(1, a.len(), 1, 1);
        let a = Tensor::from_vec(a, shape).unwrap();
        let b = Tensor::from_vec(b, shape).unwrap();
        let back = a.add(&b).unwrap().sub(&b).unwrap();
        prop_assert!(back.approx_eq(&a, 1e-3));
    }

    #[test]
    fn prop_broadcast_matches_per_slice(
        width in 1usize..6,
        batch in 2usize..5,
        seed in any::<u64>(),
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let a = Tensor::rand((width, 2, 1, batch), -1.0, 1.0, &mut rng).unwrap();
        let b = Tensor::rand((width, 2, 1, 1), -1.0, 1.0, &mut rng).unwrap();

        let sum = a.add(&b).unwrap();
        let prod = a.mul_elem(&b).unwrap();
        for n in 0..batch {
            let slice = a.batch_slice(n).unwrap();
            prop_assert_eq!(sum.batch_slice(n).unwrap(), slice.add(&b).unwrap());
            prop_assert_eq!(prod.batch_slice(n).unwrap(), slice.mul_elem(&b).unwrap());
        }
    }
}

#[test]
fn test_matmul_batch_broadcast_both_sides() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(3);
    let w = Tensor::rand((3, 4), -1.0, 1.0, &mut rng).unwrap();
    let x = Tensor::rand((2, 3, 1, 3), -1.0, 1.0, &mut rng).unwrap();
    let y = w.mul(&x)?;
    assert_eq!(y.shape(), Shape::new(2, 4, 1, 3));
    for n in 0..3 {
        let expected = w.mul(&x.batch_slice(n)?)?;
        assert_eq!(y.batch_slice(n)?, expected);
    }
    Ok(())
}

// Convolution

#[test]
fn test_conv_valid_shape_law() -> Result<()> {
    let input = Tensor::zeros((5, 5, 1, 1));
    let kernel = Tensor::zeros((3, 3, 1, 1));
    let out = input.conv2d(&kernel, 1, PaddingType::Valid)?;
    assert_eq!((out.width(), out.height()), (3, 3));
    let out = input.conv2d(&kernel, 2, PaddingType::Valid)?;
    assert_eq!((out.width(), out.height()), (2, 2));
    Ok(())
}

#[test]
fn test_conv_kernel_larger_than_input_fails() {
    let input = Tensor::zeros((2, 2, 1, 1));
    let kernel = Tensor::zeros((3, 3, 1, 1));
    assert!(input.conv2d(&kernel, 1, PaddingType::Valid).is_err());
}

#[test]
fn test_conv_multichannel_sums_over_depth() -> Result<()> {
    // two input channels of ones, two 1x1 kernels with weights (1, 2) and (3, -1)
    let input = Tensor::filled((2, 2, 2, 1), 1.0);
    let kernels = Tensor::from_vec(vec![1.0, 2.0, 3.0, -1.0], (1, 1, 2, 2))?;
    let out = input.conv2d(&kernels, 1, PaddingType::Valid)?;
    assert_eq!(out.shape(), Shape::new(2, 2, 2, 1));
    assert_eq!(out.values(), &[3.0, 3.0, 3.0, 3.0, 2.0, 2.0, 2.0, 2.0]);
    Ok(())
}

#[test]
fn test_conv_input_gradient_is_adjoint() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(11);
    for mode in MODES {
        for stride in 1..=2 {
            let input = Tensor::rand((5, 6, 2, 2), -1.0, 1.0, &mut rng).unwrap();
            let kernels = Tensor::rand((3, 3, 2, 3), -1.0, 1.0, &mut rng).unwrap();
            let out = input.conv2d(&kernels, stride, mode)?;
            let g = Tensor::rand(out.shape(), -1.0, 1.0, &mut rng).unwrap();

            let dx = Tensor::conv2d_input_gradient(&g, &kernels, stride, mode, input.shape())?;
            assert_eq!(dx.shape(), input.shape());
            assert_abs_diff_eq!(dot(&out, &g), dot(&input, &dx), epsilon = 1e-3);
        }
    }
    Ok(())
}

#[test]
fn test_conv_kernels_gradient_is_adjoint() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(12);
    for mode in MODES {
        for stride in 1..=2 {
            let input = Tensor::rand((6, 5, 2, 3), -1.0, 1.0, &mut rng).unwrap();
            let kernels = Tensor::rand((3, 2, 2, 2), -1.0, 1.0, &mut rng).unwrap();
            let out = input.conv2d(&kernels, stride, mode)?;
            let g = Tensor::rand(out.shape(), -1.0, 1.0, &mut rng).unwrap();

            let dk = Tensor::conv2d_kernels_gradient(&input, &g, stride, mode, 3, 2)?;
            assert_eq!(dk.shape(), kernels.shape());
            assert_abs_diff_eq!(dot(&out, &g), dot(&kernels, &dk), epsilon = 1e-3);
        }
    }
    Ok(())
}

#[test]
fn test_conv_kernels_gradient_sums_batch() -> Result<()> {
    let single = Tensor::range((3, 3, 1, 1), 0.0, 1.0);
    let doubled = Tensor::merge(&[single.clone(), single.clone()])?;
    let g1 = Tensor::filled((2, 2, 1, 1), 1.0);
    let g2 = Tensor::filled((2, 2, 1, 2), 1.0);

    let once = Tensor::conv2d_kernels_gradient(&single, &g1, 1, PaddingType::Valid, 2, 2)?;
    let twice = Tensor::conv2d_kernels_gradient(&doubled, &g2, 1, PaddingType::Valid, 2, 2)?;
    assert_vec_approx(twice.values(), once.mul_scalar(2.0).values(), 1e-6);
    Ok(())
}

// Pooling

#[test]
fn test_max_pool_gradient_unique_max() -> Result<()> {
    let input = Tensor::from_vec(vec![0.1, 0.9, 0.3, 0.2], (2, 2))?;
    let out = input.pool(2, 2, PoolType::Max, PaddingType::Valid)?;
    let g = Tensor::filled(out.shape(), 5.0);
    let back = Tensor::pool_gradient(&out, &input, &g, 2, 2, PoolType::Max, PaddingType::Valid)?;
    assert_eq!(back.values(), &[0.0, 5.0, 0.0, 0.0]);
    Ok(())
}

#[test]
fn test_max_pool_gradient_overlapping_windows_accumulate() -> Result<()> {
    // 3x1 row, window 2, stride 1: the middle 9 is the max of both windows
    let input = Tensor::from_vec(vec![1.0, 9.0, 2.0], (3, 1))?;
    let out = input.pool(1, 1, PoolType::Max, PaddingType::Valid)?;
    assert_eq!(out.values(), input.values());

    let input = Tensor::from_vec(vec![1.0, 9.0, 2.0, 0.0, 0.0, 0.0], (3, 2))?;
    let out = input.pool(2, 1, PoolType::Max, PaddingType::Valid)?;
    assert_eq!(out.values(), &[9.0, 9.0]);
    let g = Tensor::from_vec(vec![1.0, 2.0], out.shape())?;
    let back = Tensor::pool_gradient(&out, &input, &g, 2, 1, PoolType::Max, PaddingType::Valid)?;
    assert_eq!(back.values(), &[0.0, 3.0, 0.0, 0.0, 0.0, 0.0]);
    Ok(())
}

#[test]
fn test_avg_pool_gradient_is_adjoint() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(21);
    for mode in MODES {
        for (filter, stride) in [(2, 2), (3, 1), (2, 1)] {
            let x = Tensor::rand((6, 5, 2, 2), -1.0, 1.0, &mut rng).unwrap();
            let y = x.pool(filter, stride, PoolType::Avg, mode)?;
            let g = Tensor::rand(y.shape(), -1.0, 1.0, &mut rng).unwrap();
            let back =
                Tensor::pool_gradient(&y, &x, &g, filter, stride, PoolType::Avg, mode)?;
            assert_abs_diff_eq!(dot(&y, &g), dot(&x, &back), epsilon = 1e-4);
        }
    }
    Ok(())
}

#[test]
fn test_avg_pool_uses_nominal_area_at_borders() -> Result<()> {
    let input = Tensor::filled((2, 2), 4.0);
    let out = input.pool(3, 1, PoolType::Avg, PaddingType::Same)?;
    // every 3x3 window covers all four ones of the input, divided by 9
    assert_vec_approx(out.values(), &[16.0 / 9.0; 4], 1e-6);
    Ok(())
}

#[test]
fn test_pool_gradient_rejects_wrong_gradient_shape() {
    let input = Tensor::zeros((4, 4));
    let out = Tensor::zeros((2, 2));
    let g = Tensor::zeros((3, 3));
    assert!(
        Tensor::pool_gradient(&out, &input, &g, 2, 2, PoolType::Max, PaddingType::Valid).is_err()
    );
}

// Backend agreement

#[test]
fn test_backends_agree() -> Result<()> {
    let cpu = backend_for(BackendKind::Cpu);
    let par = backend_for(BackendKind::MultiCpu);
    let mut rng = StdRng::seed_from_u64(99);

    let a = Tensor::rand((70, 70, 1, 2), -1.0, 1.0, &mut rng).unwrap();
    let b = Tensor::rand((70, 70, 1, 1), -1.0, 1.0, &mut rng).unwrap();
    let mut r1 = Tensor::zeros(a.shape());
    let mut r2 = Tensor::zeros(a.shape());
    cpu.sub(&a, &b, &mut r1);
    par.sub(&a, &b, &mut r2);
    assert_eq!(r1, r2);

    let mut m1 = Tensor::zeros((70, 70, 1, 2));
    let mut m2 = Tensor::zeros((70, 70, 1, 2));
    cpu.mul(&a, &b, &mut m1);
    par.mul(&a, &b, &mut m2);
    assert_eq!(m1, m2);

    let input = Tensor::rand((7, 7, 3, 2), -1.0, 1.0, &mut rng).unwrap();
    let kernels = Tensor::rand((3, 3, 3, 4), -1.0, 1.0, &mut rng).unwrap();
    for mode in MODES {
        let pad = mode.params(7, 7, 3, 3, 2)?;
        let out_shape = Shape::new(pad.out_width, pad.out_height, 4, 2);

        let mut c1 = Tensor::zeros(out_shape);
        let mut c2 = Tensor::zeros(out_shape);
        cpu.conv2d(&input, &kernels, 2, pad, &mut c1);
        par.conv2d(&input, &kernels, 2, pad, &mut c2);
        assert_eq!(c1, c2);

        let g = Tensor::rand(out_shape, -1.0, 1.0, &mut rng).unwrap();
        let mut d1 = Tensor::zeros(input.shape());
        let mut d2 = Tensor::filled(input.shape(), 7.0);
        cpu.conv2d_input_gradient(&g, &kernels, 2, pad, &mut d1);
        par.conv2d_input_gradient(&g, &kernels, 2, pad, &mut d2);
        assert_eq!(d1, d2);

        let mut k1 = Tensor::zeros(kernels.shape());
        let mut k2 = Tensor::filled(kernels.shape(), 7.0);
        cpu.conv2d_kernels_gradient(&input, &g, 2, pad, &mut k1);
        par.conv2d_kernels_gradient(&input, &g, 2, pad, &mut k2);
        assert_eq!(k1, k2);

        let pool_pad = mode.params(7, 7, 2, 2, 2)?;
        let pool_shape = Shape::new(pool_pad.out_width, pool_pad.out_height, 3, 2);
        for pool_type in [PoolType::Max, PoolType::Avg] {
            let mut p1 = Tensor::zeros(pool_shape);
            let mut p2 = Tensor::zeros(pool_shape);
            cpu.pool(&input, 2, 2, pool_type, pool_pad, &mut p1);
            par.pool(&input, 2, 2, pool_type, pool_pad, &mut p2);
            assert_eq!(p1, p2);

            let pg = Tensor::rand(pool_shape, -1.0, 1.0, &mut rng).unwrap();
            let mut b1 = Tensor::zeros(input.shape());
            let mut b2 = Tensor::filled(input.shape(), 7.0);
            cpu.pool_gradient(&p1, &input, &pg, 2, 2, pool_type, pool_pad, &mut b1);
            par.pool_gradient(&p2, &input, &pg, 2, 2, pool_type, pool_pad, &mut b2);
            assert_eq!(b1, b2);
        }
    }
    Ok(())
}
