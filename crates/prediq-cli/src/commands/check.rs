//! `prediq check` - validate a predicate.

use prediq_lib::Predicate;

pub fn run(source: &str, colored: bool) -> i32 {
    let pred = Predicate::new(source);
    if pred.is_valid() {
        println!("ok");
        return 0;
    }

    eprintln!("{}", pred.diagnostics_printer().colored(colored).render());
    1
}
