//! Drive a primitive sequence through a handler

use crate::config::RunConfig;
use crate::decoder::PrimitiveDecoder;
use crate::error::{new_error, ErrorKind, Result};
use crate::handler::Handler;
use crate::primitive::Primitive;
use log::info;

/// Routes every primitive of `primitives` to the matching capability of `handler` and returns
/// the handler's output once the sequence is exhausted.
///
/// # Errors
/// Returns the first decoding error unchanged, or an [`ErrorKind::Dispatch`] error if the
/// handler fails. In both cases the handler state is discarded.
///
/// # Example
/// ```
/// use phaeton::*;
///
/// let primitives: Vec<Result<Primitive>> = vec![
///     Ok(Primitive::Point(Point { id: 1, nano_lat: 0, nano_lon: 0, tags: vec![] })),
///     Ok(Primitive::Path(Path { id: 2, refs: vec![1], tags: vec![] })),
/// ];
/// let counts = dispatch(primitives, CountingHandler::new())?;
/// assert_eq!(counts, Counts { points: 1, paths: 1, relations: 0 });
/// # Ok::<(), phaeton::Error>(())
/// ```
pub fn dispatch<I, H>(primitives: I, mut handler: H) -> Result<H::Output>
where
    I: IntoIterator<Item = Result<Primitive>>,
    H: Handler,
{
    for primitive in primitives {
        let primitive = primitive?;
        let res = match &primitive {
            Primitive::Point(point) => handler.on_point(point),
            Primitive::Path(path) => handler.on_path(path),
            Primitive::Relation(relation) => handler.on_relation(relation),
        };
        if let Err(err) = res {
            return Err(new_error(ErrorKind::Dispatch {
                kind: primitive.kind(),
                id: primitive.id(),
                err,
            }));
        }
    }

    Ok(handler.finish())
}

/// Opens the extract named by `config` and dispatches all of its primitives through `handler`.
///
/// The file is closed before this function returns, on success as well as on error.
pub fn run<H: Handler>(config: &RunConfig, handler: H) -> Result<H::Output> {
    info!(
        "reading {} (zoom {})",
        config.input_path().display(),
        config
            .zoom()
            .map_or_else(|| "unset".to_string(), |z| z.to_string())
    );

    let decoder = PrimitiveDecoder::from_path(config.input_path())?;
    let output = dispatch(decoder, handler)?;

    info!("finished {}", config.input_path().display());
    Ok(output)
}
