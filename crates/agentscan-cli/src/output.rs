use std::io::Write;

use serde_json::Value;

use crate::error::CliError;

pub fn render(data: &Value, pretty: bool) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    write_json(&mut handle, data, pretty)
}

fn write_json<W: Write>(writer: &mut W, data: &Value, pretty: bool) -> Result<(), CliError> {
    if pretty {
        serde_json::to_writer_pretty(&mut *writer, data)?;
    } else {
        serde_json::to_writer(&mut *writer, data)?;
    }
    writer.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_one_json_document_per_call() {
        let mut buffer = Vec::new();
        write_json(&mut buffer, &json!({"total": 2}), false).expect("write");
        assert_eq!(String::from_utf8(buffer).expect("utf8"), "{\"total\":2}\n");
    }
}
