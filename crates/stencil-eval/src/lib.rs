//! Stencil evaluator: assembles scanned templates and executes them.
//!
//! ```text
//! Template → assemble → Program → Executor (globals, imports, includer) → String
//! ```

pub mod assemble;
pub mod env;
pub mod error;
pub mod evaluator;
pub mod print;
pub mod value;

pub use assemble::assemble;
pub use env::Environment;
pub use error::{EvalError, EvalResult};
pub use evaluator::{Executor, Includer, NoIncludes};
pub use print::{escape_html, print_values};

use stencil_types::{Bindings, Template};

/// Assemble `template` and execute it with globals then imports bound.
pub fn execute(
    template: &Template,
    globals: &Bindings,
    imports: &Bindings,
    includer: &dyn Includer,
) -> EvalResult<String> {
    let program = assemble(template)?;
    Executor::new(includer)
        .with_bindings(globals, imports)
        .execute(&program)
}
