/// Вывод программы: текст и числа, напечатанные через `%f` / `printd`
#[derive(Debug, Default)]
pub struct Console {
    text: String,
    values: Vec<f64>,
    // Сразу печатать в stdout
    echo: bool,
}

impl Console {
    pub fn new(echo: bool) -> Self {
        Console {
            text: String::new(),
            values: Vec::new(),
            echo,
        }
    }

    pub fn write(&mut self, text: &str) {
        if self.echo {
            print!("{}", text);
        }
        self.text.push_str(text);
    }

    pub fn record_value(&mut self, value: f64) {
        self.values.push(value);
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// `%f` из C: шесть знаков, `inf` / `nan` строчными
pub fn format_float(value: f64, precision: usize) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else {
        format!("{:.*}", precision, value)
    }
}
