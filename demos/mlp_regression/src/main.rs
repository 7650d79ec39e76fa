// MLP regression demo
//
// Trains a two-layer network (sigmoid hidden layer, linear output) on a
// small synthetic regression set with mini-batches of two samples, then
// prints the network summary and predictions.
//
// Run with logging enabled:
//   RUST_LOG=info cargo run -p mlp_regression
//   AXON_BACKEND=cpu RUST_LOG=debug cargo run -p mlp_regression

use axon::prelude::*;

fn target(a: f32, b: f32) -> f32 {
    0.5 * a - 0.3 * b + 0.1
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let points = [
        (0.0, 0.0),
        (1.0, 0.0),
        (0.0, 1.0),
        (1.0, 1.0),
        (0.5, 0.2),
        (0.2, 0.8),
    ];
    let samples = points
        .iter()
        .map(|&(a, b)| Data::new(Tensor::column(vec![a, b])?, Tensor::column(vec![target(a, b)])?))
        .collect::<Result<Vec<_>>>()?;

    let mut net = NeuralNetwork::new("mlp_regression", (1, 2, 1, 1), 42)?;
    net.add_layer(Dense::new(8, Activation::Sigmoid))?
        .add_layer(Dense::new(1, Activation::Linear))?;
    net.optimize(Sgd::new(0.1).with_momentum(0.9), Loss::MeanSquareError)?;

    log::info!("backend: {}", axon::selected_backend());
    println!("{}", net.summary());

    let config = FitConfig::default()
        .batch_size(2)
        .epochs(200)
        .track(Track::TRAIN_ERROR)
        .verbosity(Verbosity::Silent);
    let result = net.fit(&samples, None, &config)?;
    if let Some(loss) = result.final_loss() {
        log::info!("final loss after {} epochs: {loss:.6}", result.epochs.len());
    }

    for &(a, b) in &points {
        let y = net.predict(&Tensor::column(vec![a, b])?)?;
        println!("f({a:.1}, {b:.1}) = {:.4} (expected {:.4})", y.values()[0], target(a, b));
    }
    Ok(())
}
