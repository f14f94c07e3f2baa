//! Datagram checks.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use colored::Colorize;
use serde_json::Value;

use crate::protocol::{Datagram, MessageType, MAX_FRAME_SIZE, PROTOCOL_VERSION};

/// Check result.
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub message: Option<String>,
}

impl TestResult {
    fn pass(name: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: Some(message.to_string()),
        }
    }
}

/// Run a check and print the result as it happens.
fn run_check<F>(name: &str, datagram: &Datagram, check_fn: F) -> TestResult
where
    F: FnOnce(&Datagram) -> Result<(), String>,
{
    print!("    {} ... ", name);
    std::io::Write::flush(&mut std::io::stdout()).ok();

    let result = match check_fn(datagram) {
        Ok(()) => TestResult::pass(name),
        Err(msg) => TestResult::fail(name, &msg),
    };

    if result.passed {
        println!("{}", "PASS".green().bold());
    } else {
        println!("{}", "FAIL".red().bold());
        if let Some(msg) = &result.message {
            println!("      {}", msg.red());
        }
    }

    result
}

/// Run every check that applies to this datagram.
pub fn check_datagram(datagram: &Datagram, expected_identity: Option<&str>) -> Vec<TestResult> {
    let mut results = Vec::new();

    results.push(run_check("Header is PUSH_DATA v1", datagram, check_header));
    results.push(run_check("Identity carries FF FF padding", datagram, check_identity_padding));
    if let Some(expected) = expected_identity {
        results.push(run_check("Identity matches gateway", datagram, |d| {
            let actual = d.identity_string();
            if actual.eq_ignore_ascii_case(expected) {
                Ok(())
            } else {
                Err(format!("Expected {}, got {}", expected, actual))
            }
        }));
    }
    results.push(run_check("Datagram within frame budget", datagram, |d| {
        if d.len <= MAX_FRAME_SIZE {
            Ok(())
        } else {
            Err(format!("{} bytes exceeds {}", d.len, MAX_FRAME_SIZE))
        }
    }));

    match datagram.kind() {
        Some("rxpk") => results.push(run_check("rxpk schema", datagram, check_rxpk)),
        Some("stat") => results.push(run_check("stat schema", datagram, check_stat)),
        _ => results.push(run_check("Body is rxpk or stat", datagram, |_| {
            Err("Body has neither rxpk nor stat".to_string())
        })),
    }

    results
}

/// Print results summary.
pub fn print_results(results: &[TestResult], datagrams: usize) {
    println!("\n{}", "=".repeat(60));
    println!("{}", "Check Results".bold());
    println!("{}", "=".repeat(60));

    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;

    for result in results.iter().filter(|r| !r.passed) {
        println!("  {} {}", "[FAIL]".red().bold(), result.name);
        if let Some(msg) = &result.message {
            println!("         {}", msg.red());
        }
    }

    println!("{}", "-".repeat(60));
    println!("  Datagrams: {}", datagrams);
    println!(
        "  Total: {} passed, {} failed",
        passed.to_string().green(),
        if failed > 0 {
            failed.to_string().red()
        } else {
            failed.to_string().normal()
        }
    );
    println!("{}", "=".repeat(60));
}

// --- Individual Checks ---

fn check_header(d: &Datagram) -> Result<(), String> {
    if d.version != PROTOCOL_VERSION {
        return Err(format!("Expected version {}, got {}", PROTOCOL_VERSION, d.version));
    }
    if d.msg_type != MessageType::PushData {
        return Err(format!("Expected PushData, got {:?}", d.msg_type));
    }
    Ok(())
}

fn check_identity_padding(d: &Datagram) -> Result<(), String> {
    if d.identity[3] == 0xFF && d.identity[4] == 0xFF {
        Ok(())
    } else {
        Err(format!("Identity {} lacks FF FF in bytes 3-4", d.identity_string()))
    }
}

fn field<'a>(obj: &'a Value, key: &str) -> Result<&'a Value, String> {
    obj.get(key).ok_or_else(|| format!("Missing field '{}'", key))
}

fn uint_field(obj: &Value, key: &str) -> Result<u64, String> {
    field(obj, key)?
        .as_u64()
        .ok_or_else(|| format!("'{}' is not an unsigned integer", key))
}

fn int_field(obj: &Value, key: &str) -> Result<i64, String> {
    field(obj, key)?
        .as_i64()
        .ok_or_else(|| format!("'{}' is not an integer", key))
}

fn float_field(obj: &Value, key: &str) -> Result<f64, String> {
    field(obj, key)?
        .as_f64()
        .ok_or_else(|| format!("'{}' is not a number", key))
}

fn str_field<'a>(obj: &'a Value, key: &str) -> Result<&'a str, String> {
    field(obj, key)?
        .as_str()
        .ok_or_else(|| format!("'{}' is not a string", key))
}

/// `SF<7-12>BW<125|250|500>`
fn valid_datr(datr: &str) -> bool {
    let Some(rest) = datr.strip_prefix("SF") else {
        return false;
    };
    let Some((sf, bw)) = rest.split_once("BW") else {
        return false;
    };
    matches!(sf.parse::<u8>(), Ok(7..=12)) && matches!(bw, "125" | "250" | "500")
}

fn check_rxpk(d: &Datagram) -> Result<(), String> {
    let rxpk = field(&d.body, "rxpk")?
        .as_array()
        .ok_or("'rxpk' is not an array")?;
    if rxpk.len() != 1 {
        return Err(format!("Expected one rxpk element, got {}", rxpk.len()));
    }
    let pkt = &rxpk[0];

    let tmst = uint_field(pkt, "tmst")?;
    if tmst > u32::MAX as u64 {
        return Err(format!("tmst {} exceeds 32 bits", tmst));
    }
    uint_field(pkt, "chan")?;
    uint_field(pkt, "rfch")?;

    let freq = float_field(pkt, "freq")?;
    if !(137.0..=1020.0).contains(&freq) {
        return Err(format!("freq {} MHz out of range", freq));
    }
    if int_field(pkt, "stat")? != 1 {
        return Err("stat is not 1".to_string());
    }
    if str_field(pkt, "modu")? != "LORA" {
        return Err("modu is not LORA".to_string());
    }

    let datr = str_field(pkt, "datr")?;
    if !valid_datr(datr) {
        return Err(format!("Malformed datr '{}'", datr));
    }
    let codr = str_field(pkt, "codr")?;
    if !matches!(codr, "4/5" | "4/6" | "4/7" | "4/8") {
        return Err(format!("Malformed codr '{}'", codr));
    }

    int_field(pkt, "lsnr")?;
    int_field(pkt, "rssi")?;
    let size = uint_field(pkt, "size")?;
    let data = str_field(pkt, "data")?;
    let payload = STANDARD
        .decode(data)
        .map_err(|e| format!("data is not base64: {}", e))?;
    if payload.len() as u64 != size {
        return Err(format!("size {} but data decodes to {} bytes", size, payload.len()));
    }

    print!("({} bytes, {}) ", size, datr);
    Ok(())
}

fn check_stat(d: &Datagram) -> Result<(), String> {
    let stat = field(&d.body, "stat")?;

    // "YYYY-MM-DD HH:MM:SS GMT"
    let time = str_field(stat, "time")?;
    let shape_ok = time.len() == 23
        && time.ends_with(" GMT")
        && time
            .char_indices()
            .take(19)
            .all(|(i, c)| match i {
                4 | 7 => c == '-',
                10 => c == ' ',
                13 | 16 => c == ':',
                _ => c.is_ascii_digit(),
            });
    if !shape_ok {
        return Err(format!("Malformed time '{}'", time));
    }

    float_field(stat, "lati")?;
    float_field(stat, "long")?;
    int_field(stat, "alti")?;

    let rxnb = uint_field(stat, "rxnb")?;
    let rxok = uint_field(stat, "rxok")?;
    let rxfw = uint_field(stat, "rxfw")?;
    if rxok > rxnb {
        return Err(format!("rxok {} exceeds rxnb {}", rxok, rxnb));
    }
    if rxfw > rxok {
        return Err(format!("rxfw {} exceeds rxok {}", rxfw, rxok));
    }

    if float_field(stat, "ackr")? != 0.0 {
        return Err("ackr is not 0".to_string());
    }
    if uint_field(stat, "dwnb")? != 0 || uint_field(stat, "txnb")? != 0 {
        return Err("dwnb/txnb are not 0".to_string());
    }

    str_field(stat, "pfrm")?;
    str_field(stat, "mail")?;
    str_field(stat, "desc")?;

    print!("(rxnb {} rxok {} rxfw {}) ", rxnb, rxok, rxfw);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::parse_datagram;

    fn datagram(body: &str) -> Datagram {
        let mut data = vec![1, 0x12, 0x34, 0x00, 1, 2, 3, 0xFF, 0xFF, 4, 5, 6];
        data.extend_from_slice(body.as_bytes());
        parse_datagram(&data).unwrap()
    }

    #[test]
    fn test_valid_rxpk() {
        let d = datagram(
            r#"{"rxpk":[{"tmst":3000000001,"chan":0,"rfch":0,"freq":865.200000,"stat":1,"modu":"LORA","datr":"SF12BW125","codr":"4/5","lsnr":7,"rssi":-57,"size":5,"data":"aGVsbG8="}]}"#,
        );
        assert_eq!(d.kind(), Some("rxpk"));
        assert_eq!(check_rxpk(&d), Ok(()));
    }

    #[test]
    fn test_rxpk_size_mismatch() {
        let d = datagram(
            r#"{"rxpk":[{"tmst":1,"chan":0,"rfch":0,"freq":865.2,"stat":1,"modu":"LORA","datr":"SF12BW125","codr":"4/5","lsnr":7,"rssi":-57,"size":4,"data":"aGVsbG8="}]}"#,
        );
        assert!(check_rxpk(&d).is_err());
    }

    #[test]
    fn test_valid_stat() {
        let d = datagram(
            r#"{"stat":{"time":"2024-03-09 07:05:02 GMT","lati":0.00000,"long":0.00000,"alti":0,"rxnb":5,"rxok":4,"rxfw":3,"ackr":0.0,"dwnb":0,"txnb":0,"pfrm":"Single Channel Gateway","mail":"","desc":""}}"#,
        );
        assert_eq!(d.kind(), Some("stat"));
        assert_eq!(check_stat(&d), Ok(()));
        assert_eq!(check_header(&d), Ok(()));
        assert_eq!(check_identity_padding(&d), Ok(()));
    }

    #[test]
    fn test_stat_counter_ordering() {
        let d = datagram(
            r#"{"stat":{"time":"2024-03-09 07:05:02 GMT","lati":0,"long":0,"alti":0,"rxnb":1,"rxok":2,"rxfw":0,"ackr":0.0,"dwnb":0,"txnb":0,"pfrm":"","mail":"","desc":""}}"#,
        );
        assert!(check_stat(&d).is_err());
    }

    #[test]
    fn test_datr_format() {
        assert!(valid_datr("SF7BW125"));
        assert!(valid_datr("SF12BW500"));
        assert!(!valid_datr("SF6BW125"));
        assert!(!valid_datr("SF12BW62"));
        assert!(!valid_datr("SF12"));
    }
}
