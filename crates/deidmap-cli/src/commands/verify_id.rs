use deidmap_checksum::SurrogateId;

pub fn verify(id: &str) -> Result<SurrogateId, String> {
    SurrogateId::parse(id).map_err(|e| e.to_string())
}

pub fn run(id: String) {
    match verify(&id) {
        Ok(parsed) => println!("{parsed} ok"),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_a_valid_id() {
        assert!(verify("J1000123-4").is_ok());
    }

    #[test]
    fn verify_reports_the_bad_check_digit() {
        let err = verify("J1000456-7").expect_err("wrong digit must fail");
        assert!(err.contains("check-digit"));
    }
}
