/*!
Stream the primitives of an OpenStreetMap extract (\*.osm.pbf) through pluggable handlers.

An extract is decoded lazily, one blob at a time, into a sequence of [`Primitive`]s: points,
paths and relations. [`dispatch`] routes each of them to the matching method of a [`Handler`]
and returns the handler's output at the end of the sequence.

## Example: Count primitives

```rust,no_run
use phaeton::*;

fn main() -> Result<()> {
    let decoder = PrimitiveDecoder::from_path("extract.osm.pbf")?;
    let counts = dispatch(decoder, CountingHandler::new())?;

    println!("{counts}");
    Ok(())
}
```

## Example: A custom handler

Handlers only implement the capabilities they need. This one collects the ids of closed paths:

```rust,no_run
use phaeton::*;

#[derive(Default)]
struct ClosedPaths(Vec<u64>);

impl Handler for ClosedPaths {
    type Output = Vec<u64>;

    fn on_path(&mut self, path: &Path) -> HandlerResult {
        if path.is_closed() {
            self.0.push(path.id);
        }
        Ok(())
    }

    fn finish(self) -> Vec<u64> {
        self.0
    }
}

fn main() -> Result<()> {
    let config = RunConfig::new("extract.osm.pbf", None).unwrap();
    let closed = run(&config, ClosedPaths::default())?;

    println!("{} closed paths", closed.len());
    Ok(())
}
```

## Example: A road graph

[`build_graph`] reads an extract twice and keeps the paths tagged `highway` as edges, plus the
points they reference as vertices:

```rust,no_run
use phaeton::*;

fn main() -> Result<()> {
    let config = RunConfig::new("extract.osm.pbf", None).unwrap();
    let graph = build_graph(&config)?;

    println!("{} edges, {} vertices", graph.edges.len(), graph.vertices.len());
    Ok(())
}
```
*/

pub use blob::*;
pub use block::*;
pub use config::*;
pub use decoder::*;
pub use dense::*;
pub use dispatch::*;
pub use error::{Error, ErrorKind, HandlerError, MalformedInput, Result, UnsupportedFormat};
pub use graph::*;
pub use handler::*;
pub use primitive::*;
pub use writer::*;

pub mod blob;
pub mod block;
pub mod config;
pub mod decoder;
pub mod dense;
pub mod dispatch;
mod elements;
mod error;
pub mod graph;
pub mod handler;
pub mod primitive;
mod proto {
    include!(concat!(env!("OUT_DIR"), "/mod.rs"));
}
pub mod writer;
