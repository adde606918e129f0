/// Предельная глубина вызовов (рекурсия без базы иначе съест стек)
pub const MAX_CALL_DEPTH: usize = 1000;

/// Сколько инструкций разрешено выполнить за один запуск
pub const MAX_STEPS: u64 = 50_000_000;

/// Знаков после точки у `%f`, как в C
pub const PRINTF_PRECISION: usize = 6;
