//! `prediq describe` - render the AST.

use prediq_lib::optimize;
use prediq_lib::parser;

use super::load_predicate;

pub fn run(source: &str, optimized: bool, colored: bool) -> i32 {
    let Some(pred) = load_predicate(source, colored) else {
        return 1;
    };

    if optimized {
        // Re-parse so the rendering reflects exactly what optimization did
        // to this source.
        let outcome = parser::parse(source);
        if let Some(ast) = outcome.ast {
            print!("{}", optimize::optimize(&ast).describe());
        }
    } else {
        print!("{}", pred.description());
    }
    0
}
